//! Completion state: which components finished in a build root.
//!
//! A completion marker is created only after a component installed
//! successfully. Markers are never rewritten; they disappear only when the
//! whole build root is cleaned.

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::MARKER_PREFIX;

#[derive(Debug, Error)]
pub enum StateError {
  #[error("failed to read completion state in '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write completion marker '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Contents of a marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRecord {
  pub name: String,
  pub version: String,
  pub completed_at_unix: u64,
}

/// Storage for completion markers.
pub trait CompletionStore {
  fn is_complete(&self, name: &str) -> Result<bool, StateError>;

  /// Record `name` as complete. Marking an already complete component is a no-op.
  fn mark_complete(&mut self, name: &str, version: &str) -> Result<(), StateError>;

  /// Names of all completed components, sorted.
  fn completed(&self) -> Result<Vec<String>, StateError>;
}

/// Markers as `built_<name>` files in a directory.
#[derive(Debug, Clone)]
pub struct MarkerStore {
  dir: PathBuf,
}

impl MarkerStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn marker_path(&self, name: &str) -> PathBuf {
    self.dir.join(format!("{MARKER_PREFIX}{name}"))
  }

  /// Read the record behind a marker, if it exists and parses.
  pub fn record(&self, name: &str) -> Option<MarkerRecord> {
    let content = std::fs::read_to_string(self.marker_path(name)).ok()?;
    serde_json::from_str(&content).ok()
  }
}

impl CompletionStore for MarkerStore {
  fn is_complete(&self, name: &str) -> Result<bool, StateError> {
    let path = self.marker_path(name);
    path.try_exists().map_err(|source| StateError::Read { path, source })
  }

  fn mark_complete(&mut self, name: &str, version: &str) -> Result<(), StateError> {
    let path = self.marker_path(name);
    if self.is_complete(name)? {
      return Ok(());
    }

    let write_err = |source| StateError::Write {
      path: path.clone(),
      source,
    };

    std::fs::create_dir_all(&self.dir).map_err(write_err)?;

    let record = MarkerRecord {
      name: name.to_string(),
      version: version.to_string(),
      completed_at_unix: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs(),
    };

    // Write through a temp file so a crash never leaves a half-written marker.
    let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(write_err)?;
    serde_json::to_writer_pretty(&mut tmp, &record).map_err(|e| write_err(io::Error::other(e)))?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(&path).map_err(|e| write_err(e.error))?;

    debug!(name, marker = %path.display(), "marked complete");
    Ok(())
  }

  fn completed(&self) -> Result<Vec<String>, StateError> {
    let entries = match std::fs::read_dir(&self.dir) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(source) => {
        return Err(StateError::Read {
          path: self.dir.clone(),
          source,
        });
      }
    };

    let mut names = BTreeSet::new();
    for entry in entries {
      let entry = entry.map_err(|source| StateError::Read {
        path: self.dir.clone(),
        source,
      })?;
      if let Some(name) = entry.file_name().to_str().and_then(|f| f.strip_prefix(MARKER_PREFIX)) {
        names.insert(name.to_string());
      }
    }

    Ok(names.into_iter().collect())
  }
}

/// In-memory completion state, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  completed: BTreeSet<String>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_completed<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      completed: names.into_iter().map(Into::into).collect(),
    }
  }
}

impl CompletionStore for MemoryStore {
  fn is_complete(&self, name: &str) -> Result<bool, StateError> {
    Ok(self.completed.contains(name))
  }

  fn mark_complete(&mut self, name: &str, _version: &str) -> Result<(), StateError> {
    self.completed.insert(name.to_string());
    Ok(())
  }

  fn completed(&self) -> Result<Vec<String>, StateError> {
    Ok(self.completed.iter().cloned().collect())
  }
}
