//! Literal text patches applied to extracted sources before configuring.
//!
//! A patch is a `(file, find, replace)` triple. Patches target optional
//! compatibility fixes, so a missing file or an absent search string is a
//! no-op rather than an error. Applying the same patch twice leaves the file
//! exactly as a single application did.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PatchError {
  #[error("failed to read '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A literal find/replace edit on one file, relative to the source tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextPatch {
  pub file: PathBuf,
  pub find: String,
  pub replace: String,
}

/// What happened when a patch was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
  /// Every occurrence of the search string was replaced.
  Applied { occurrences: usize },
  /// The target file does not exist.
  MissingFile,
  /// The search string does not occur in the file.
  NotFound,
  /// The replacement (which itself contains the search string) is already present.
  AlreadyApplied,
}

impl PatchOutcome {
  pub fn changed(self) -> bool {
    matches!(self, PatchOutcome::Applied { .. })
  }
}

impl TextPatch {
  pub fn new(file: impl Into<PathBuf>, find: &str, replace: &str) -> Self {
    Self {
      file: file.into(),
      find: find.to_string(),
      replace: replace.to_string(),
    }
  }

  /// Apply the patch to an in-memory string.
  ///
  /// Returns the patched contents, or the reason nothing changed.
  pub fn apply_to(&self, contents: &str) -> Result<(String, usize), PatchOutcome> {
    if self.find.is_empty() || !contents.contains(&self.find) {
      return Err(PatchOutcome::NotFound);
    }

    if self.replace.contains(&self.find) && contents.contains(&self.replace) {
      return Err(PatchOutcome::AlreadyApplied);
    }

    let occurrences = contents.matches(&self.find).count();
    Ok((contents.replace(&self.find, &self.replace), occurrences))
  }

  /// Apply the patch to `source_dir/file`, rewriting it only when something changed.
  pub fn apply(&self, source_dir: &Path) -> Result<PatchOutcome, PatchError> {
    let path = source_dir.join(&self.file);

    let contents = match std::fs::read_to_string(&path) {
      Ok(contents) => contents,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "patch target missing, skipping");
        return Ok(PatchOutcome::MissingFile);
      }
      Err(source) => return Err(PatchError::Read { path, source }),
    };

    match self.apply_to(&contents) {
      Ok((patched, occurrences)) => {
        std::fs::write(&path, patched).map_err(|source| PatchError::Write {
          path: path.clone(),
          source,
        })?;
        debug!(path = %path.display(), occurrences, "patch applied");
        Ok(PatchOutcome::Applied { occurrences })
      }
      Err(outcome) => {
        debug!(path = %path.display(), ?outcome, "patch not applied");
        Ok(outcome)
      }
    }
  }
}
