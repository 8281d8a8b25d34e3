//! Per-component log files.
//!
//! Each component gets `logs/<name>.log`, truncated when the component
//! starts. Orchestrator step headers and all subprocess output land in it.
//! Nothing reads it back for correctness; it is the diagnostic surface when a
//! component fails.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

#[derive(Debug, Clone)]
pub struct BuildLog {
  path: PathBuf,
}

impl BuildLog {
  /// Start a fresh log at `path`, discarding any previous content.
  pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
    let path = path.into();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    File::create(&path)?;
    Ok(Self { path })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Append a `==> message` header line.
  ///
  /// Write failures are reported through tracing and otherwise ignored.
  pub fn step(&self, message: &str) {
    if let Err(e) = self.append(&format!("==> {message}")) {
      warn!(log = %self.path.display(), error = %e, "failed to write build log");
    }
  }

  fn append(&self, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
    writeln!(file, "{line}")
  }

  /// The last `lines` lines of the log.
  pub fn tail(&self, lines: usize) -> Vec<String> {
    tail_file(&self.path, lines).unwrap_or_default()
  }
}

/// Read the last `lines` lines of a file, replacing invalid UTF-8.
pub fn tail_file(path: &Path, lines: usize) -> io::Result<Vec<String>> {
  if lines == 0 {
    return Ok(Vec::new());
  }

  let reader = BufReader::new(File::open(path)?);
  let mut tail = VecDeque::with_capacity(lines);
  for line in reader.split(b'\n') {
    let line = line?;
    if tail.len() == lines {
      tail.pop_front();
    }
    tail.push_back(String::from_utf8_lossy(&line).into_owned());
  }

  Ok(tail.into())
}
