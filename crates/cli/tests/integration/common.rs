//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding the manifest, the
/// build root and the sysroot.
pub struct TestEnv {
  pub temp: TempDir,
  pub config_path: PathBuf,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("stack.toml");
    Self { temp, config_path }
  }

  /// Write `stack.toml` with a `[build]` table pointing into the temp directory,
  /// packaging off, fast retries, followed by `rest`.
  pub fn write_manifest(&self, rest: &str) {
    let content = format!(
      r#"
[build]
root = "build"
sysroot = "{sysroot}"
jobs = 1

[fetch]
attempts = 2
retry_delay_secs = 0
timeout_secs = 10

[package]
enabled = false

{rest}
"#,
      sysroot = self.sysroot_path().display()
    );
    std::fs::write(&self.config_path, content).unwrap();
  }

  pub fn root_path(&self) -> PathBuf {
    let p = self.temp.path().join("build");
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn sysroot_path(&self) -> PathBuf {
    let p = self.temp.path().join("sysroot");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// A command for the stagehand binary running in the temp directory.
  pub fn stagehand_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("stagehand");
    cmd.current_dir(self.temp.path());
    cmd.env_remove("STAGEHAND_ROOT");
    cmd
  }
}

/// Gzipped tarball bytes containing `entries` (path, contents).
pub fn tar_gz_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
  let encoder = GzEncoder::new(Vec::new(), Compression::default());
  let mut builder = tar::Builder::new(encoder);
  for (path, contents) in entries {
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, contents.as_bytes()).unwrap();
  }
  builder.into_inner().unwrap().finish().unwrap()
}

/// Serve an asset bundle `<name>-<version>.tar.gz` holding one data file.
pub fn mock_asset(server: &mut mockito::ServerGuard, name: &str, version: &str) -> mockito::Mock {
  let file = format!("{name}-{version}/{name}.dat");
  server
    .mock("GET", format!("/{name}-{version}.tar.gz").as_str())
    .with_status(200)
    .with_body(tar_gz_bytes(&[(file.as_str(), "payload\n")]))
    .create()
}

/// A `[[component]]` table for a copy-strategy asset served by `server`.
pub fn asset_component(server: &mockito::ServerGuard, name: &str, version: &str) -> String {
  format!(
    r#"
[[component]]
name = "{name}"
version = "{version}"
strategy = "copy"
source = {{ kind = "tarball", url = "{url}/{name}-{version}.tar.gz" }}
"#,
    url = server.url()
  )
}
