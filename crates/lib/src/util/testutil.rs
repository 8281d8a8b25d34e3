//! Test helpers for stagehand-lib: a recording runner, archive builders and git repositories.

use std::fs::File;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::execute::{ExecuteError, Invocation, Runner};

type Hook = Arc<dyn Fn(&Invocation) + Send + Sync>;

/// Runner that records invocations instead of spawning processes.
///
/// Commands whose program is registered with [`RecordingRunner::fail_on`] exit
/// with code 1. An optional hook runs for every invocation so tests can
/// simulate side effects such as installed files.
#[derive(Clone, Default)]
pub struct RecordingRunner {
  calls: Arc<Mutex<Vec<Invocation>>>,
  failing: Arc<Mutex<Vec<String>>>,
  hook: Option<Hook>,
}

impl RecordingRunner {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fail_on(self, program: &str) -> Self {
    self.failing.lock().unwrap().push(program.to_string());
    self
  }

  pub fn on_run(mut self, hook: impl Fn(&Invocation) + Send + Sync + 'static) -> Self {
    self.hook = Some(Arc::new(hook));
    self
  }

  pub fn calls(&self) -> Vec<Invocation> {
    self.calls.lock().unwrap().clone()
  }

  pub fn programs(&self) -> Vec<String> {
    self.calls().into_iter().map(|c| c.program).collect()
  }
}

impl Runner for RecordingRunner {
  async fn run(&self, invocation: &Invocation, _log: &Path) -> Result<(), ExecuteError> {
    self.calls.lock().unwrap().push(invocation.clone());
    if let Some(hook) = &self.hook {
      hook(invocation);
    }
    if self.failing.lock().unwrap().contains(&invocation.program) {
      return Err(ExecuteError::CmdFailed {
        cmd: invocation.to_string(),
        code: Some(1),
      });
    }
    Ok(())
  }
}

fn append_entries<W: std::io::Write>(builder: &mut tar::Builder<W>, entries: &[(&str, &str)]) {
  for (path, contents) in entries {
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder.append_data(&mut header, path, contents.as_bytes()).unwrap();
  }
}

/// Write an uncompressed tarball containing `entries` (path, contents).
pub fn tar(path: &Path, entries: &[(&str, &str)]) {
  let mut builder = tar::Builder::new(File::create(path).unwrap());
  append_entries(&mut builder, entries);
  builder.finish().unwrap();
}

/// Write a gzipped tarball containing `entries` (path, contents).
pub fn tar_gz(path: &Path, entries: &[(&str, &str)]) {
  let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
  let mut builder = tar::Builder::new(encoder);
  append_entries(&mut builder, entries);
  builder.into_inner().unwrap().finish().unwrap();
}

/// Write a zip archive containing `entries` (path, contents).
pub fn zip_archive(path: &Path, entries: &[(&str, &str)]) {
  use std::io::Write;

  let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
  let options = zip::write::SimpleFileOptions::default();
  for (name, contents) in entries {
    writer.start_file(*name, options).unwrap();
    writer.write_all(contents.as_bytes()).unwrap();
  }
  writer.finish().unwrap();
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

/// Create a repository at `dir` holding `files`, committed on `main` and
/// tagged `v1.0`. Returns its `file://` URL.
pub fn git_repo(dir: &Path, files: &[(&str, &str)]) -> String {
  for (path, contents) in files {
    let path = dir.join(path);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
  }
  git(dir, &["init", "-q", "-b", "main"]);
  git(dir, &["add", "."]);
  git(dir, &["commit", "-q", "-m", "initial"]);
  git(dir, &["tag", "v1.0"]);
  format!("file://{}", dir.display())
}
