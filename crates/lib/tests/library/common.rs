//! Shared helpers for stagehand-lib integration tests.

use std::cell::RefCell;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use flate2::Compression;
use flate2::write::GzEncoder;
use stagehand_lib::component::ComponentSpec;
use stagehand_lib::execute::{ExecuteError, Invocation, Runner};
use stagehand_lib::manifest::{FetchSettings, Manifest, Settings};
use stagehand_lib::orchestrator::{Event, Orchestrator};
use stagehand_lib::root::BuildRoot;
use stagehand_lib::state::{CompletionStore, MarkerStore, StateError};
use tempfile::TempDir;

/// Runner that pretends to be the build tools.
///
/// Install steps drop a file into the requested stage directory, the package
/// tool writes its output path and `cp -R . <dest>` really copies. Commands
/// run in a directory containing one of the `fail_in` fragments exit with 2.
#[derive(Clone, Default)]
pub struct FakeTools {
  calls: Arc<Mutex<Vec<Invocation>>>,
  fail_in: Arc<Mutex<Vec<String>>>,
  fail_programs: Arc<Mutex<Vec<String>>>,
}

impl FakeTools {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn failing_in(self, fragment: &str) -> Self {
    self.fail_in.lock().unwrap().push(fragment.to_string());
    self
  }

  pub fn failing_program(self, program: &str) -> Self {
    self.fail_programs.lock().unwrap().push(program.to_string());
    self
  }

  pub fn calls(&self) -> Vec<Invocation> {
    self.calls.lock().unwrap().clone()
  }

  pub fn programs(&self) -> Vec<String> {
    self.calls().into_iter().map(|c| c.program).collect()
  }

  fn should_fail(&self, inv: &Invocation) -> bool {
    if self.fail_programs.lock().unwrap().contains(&inv.program) {
      return true;
    }
    let cwd = inv.cwd.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
    self.fail_in.lock().unwrap().iter().any(|f| cwd.contains(f.as_str()))
  }

  fn side_effects(inv: &Invocation) {
    let destdir = inv
      .arg_value("DESTDIR")
      .map(PathBuf::from)
      .or_else(|| inv.env.get("DESTDIR").map(PathBuf::from))
      .or_else(|| {
        let pos = inv.args.iter().position(|a| a == "--destdir")?;
        inv.args.get(pos + 1).map(PathBuf::from)
      });

    if let Some(destdir) = destdir {
      let lib = destdir.join("usr/local/lib");
      std::fs::create_dir_all(&lib).unwrap();
      std::fs::write(lib.join("installed.so"), b"\x7fELF").unwrap();
      return;
    }

    match inv.program.as_str() {
      "dpkg-deb" => {
        std::fs::write(inv.args.last().unwrap(), b"!<arch>").unwrap();
      }
      "mkdir" => {
        std::fs::create_dir_all(inv.args.last().unwrap()).unwrap();
      }
      "cp" => {
        let from = inv.cwd.clone().unwrap();
        let to = PathBuf::from(inv.args.last().unwrap());
        copy_dir(&from, &to);
      }
      _ => {}
    }
  }
}

impl Runner for FakeTools {
  async fn run(&self, invocation: &Invocation, _log: &Path) -> Result<(), ExecuteError> {
    self.calls.lock().unwrap().push(invocation.clone());
    if self.should_fail(invocation) {
      return Err(ExecuteError::CmdFailed {
        cmd: invocation.to_string(),
        code: Some(2),
      });
    }
    Self::side_effects(invocation);
    Ok(())
  }
}

fn copy_dir(from: &Path, to: &Path) {
  std::fs::create_dir_all(to).unwrap();
  for entry in std::fs::read_dir(from).unwrap() {
    let entry = entry.unwrap();
    let dest = to.join(entry.file_name());
    if entry.file_type().unwrap().is_dir() {
      copy_dir(&entry.path(), &dest);
    } else {
      std::fs::copy(entry.path(), dest).unwrap();
    }
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

/// A temp directory holding a build root and a sysroot.
pub struct TestEnv {
  pub temp: TempDir,
  pub manifest: Manifest,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let sysroot = temp.path().join("sysroot");
    std::fs::create_dir_all(&sysroot).unwrap();

    let manifest = Manifest {
      settings: Settings {
        root: temp.path().join("build"),
        sysroot,
        jobs: 2,
        arch: "aarch64".to_string(),
        ..Settings::default()
      },
      fetch: FetchSettings {
        attempts: 2,
        retry_delay_secs: 0,
        timeout_secs: 10,
      },
      ..Manifest::default()
    };

    Self { temp, manifest }
  }

  pub fn root_path(&self) -> PathBuf {
    self.manifest.settings.root.clone()
  }

  pub fn root(&self) -> BuildRoot {
    BuildRoot::create(self.root_path()).unwrap()
  }

  pub fn sysroot(&self) -> PathBuf {
    self.manifest.settings.sysroot.clone()
  }

  /// A fresh orchestrator over the persistent marker store, as a new process would create.
  pub fn orchestrator(&self, tools: FakeTools) -> Orchestrator<MarkerStore, FakeTools> {
    let root = self.root();
    let store = MarkerStore::new(root.markers_dir());
    Orchestrator::new(root, &self.manifest, store, tools).unwrap()
  }
}

/// Collects events emitted through the reporter.
pub fn event_sink() -> (Rc<RefCell<Vec<Event>>>, impl Fn(&Event) + 'static) {
  let events = Rc::new(RefCell::new(Vec::new()));
  let sink = events.clone();
  (events, move |e: &Event| sink.borrow_mut().push(e.clone()))
}

/// A tarball component served by `server` at `/<name>-<version>.tar.gz`.
pub fn served(server: &mockito::Server, name: &str, version: &str) -> ComponentSpec {
  ComponentSpec::tarball(name, version, &format!("{}/{name}-{version}.tar.gz", server.url()))
}

/// Mock a well-formed `<name>-<version>.tar.gz` with a configure script.
pub async fn mock_tarball(server: &mut mockito::Server, name: &str, version: &str, hits: usize) -> mockito::Mock {
  let configure = format!("{name}-{version}/configure");
  let compat = format!("{name}-{version}/src/compat.c");
  let body = tar_gz_bytes(&[
    (configure.as_str(), "#!/bin/sh\n"),
    (compat.as_str(), "#include <sys/shm.h>\nint x;\n"),
  ]);
  server
    .mock("GET", format!("/{name}-{version}.tar.gz").as_str())
    .with_status(200)
    .with_body(body)
    .expect(hits)
    .create_async()
    .await
}

/// Marker store whose lookups for one component fail with an I/O error.
pub struct UnreadableStore {
  inner: MarkerStore,
  unreadable: String,
}

impl UnreadableStore {
  pub fn new(inner: MarkerStore, unreadable: &str) -> Self {
    Self {
      inner,
      unreadable: unreadable.to_string(),
    }
  }
}

impl CompletionStore for UnreadableStore {
  fn is_complete(&self, name: &str) -> Result<bool, StateError> {
    if name == self.unreadable {
      return Err(StateError::Read {
        path: PathBuf::from(name),
        source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
      });
    }
    self.inner.is_complete(name)
  }

  fn mark_complete(&mut self, name: &str, version: &str) -> Result<(), StateError> {
    self.inner.mark_complete(name, version)
  }

  fn completed(&self) -> Result<Vec<String>, StateError> {
    self.inner.completed()
  }
}

fn git(dir: &Path, args: &[&str]) {
  let status = Command::new("git")
    .args(["-c", "user.name=stagehand", "-c", "user.email=stagehand@example.org"])
    .args(["-c", "commit.gpgsign=false", "-c", "tag.gpgsign=false"])
    .args(args)
    .current_dir(dir)
    .status()
    .unwrap();
  assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

/// A repository at `dir` with a configure script, committed on `main` and
/// tagged `v1.0`. Returns its `file://` URL.
pub fn git_repo(dir: &Path) -> String {
  std::fs::create_dir_all(dir.join("src")).unwrap();
  std::fs::write(dir.join("configure"), "#!/bin/sh\n").unwrap();
  std::fs::write(dir.join("src/compat.c"), "int x;\n").unwrap();
  git(dir, &["init", "-q", "-b", "main"]);
  git(dir, &["add", "."]);
  git(dir, &["commit", "-q", "-m", "initial"]);
  git(dir, &["tag", "v1.0"]);
  format!("file://{}", dir.display())
}
