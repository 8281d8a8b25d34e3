//! Build root layout.
//!
//! ```text
//! <root>/
//!   downloads/<name>/<version>/<file>   cached source archives
//!   downloads/git/<name>-<rev>/         cached git checkouts
//!   src/<dir>/                          extracted source trees
//!   staging/<name>/                     per-component install trees
//!   packages/                           distributable archives
//!   markers/built_<name>                completion markers
//!   logs/<name>.log                     per-component logs
//!   work/                               scratch space
//! ```
//!
//! The root persists across runs so interrupted builds resume. Running two
//! orchestrators against the same root at once is not supported.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::consts::MARKER_PREFIX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRoot {
  path: PathBuf,
}

impl BuildRoot {
  /// Refer to a build root without touching the filesystem.
  pub fn at(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// Create the root and its fixed subdirectories if absent.
  ///
  /// The stored path is canonicalized so adapters can hand it to tools
  /// running in other working directories.
  pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
    let path = path.into();
    std::fs::create_dir_all(&path)?;
    let path = dunce::canonicalize(&path)?;
    let root = Self { path };

    for dir in [
      root.logs_dir(),
      root.downloads_dir(),
      root.src_dir(),
      root.staging_dir(),
      root.packages_dir(),
      root.markers_dir(),
      root.work_dir(),
    ] {
      std::fs::create_dir_all(dir)?;
    }

    debug!(root = %root.path.display(), "build root ready");
    Ok(root)
  }

  /// Remove the whole root. Succeeds when it does not exist.
  pub fn destroy(&self) -> io::Result<bool> {
    match std::fs::remove_dir_all(&self.path) {
      Ok(()) => {
        info!(root = %self.path.display(), "build root removed");
        Ok(true)
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(e),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn exists(&self) -> bool {
    self.path.exists()
  }

  pub fn logs_dir(&self) -> PathBuf {
    self.path.join("logs")
  }

  pub fn downloads_dir(&self) -> PathBuf {
    self.path.join("downloads")
  }

  pub fn src_dir(&self) -> PathBuf {
    self.path.join("src")
  }

  pub fn staging_dir(&self) -> PathBuf {
    self.path.join("staging")
  }

  pub fn packages_dir(&self) -> PathBuf {
    self.path.join("packages")
  }

  pub fn markers_dir(&self) -> PathBuf {
    self.path.join("markers")
  }

  pub fn work_dir(&self) -> PathBuf {
    self.path.join("work")
  }

  pub fn log_path(&self, name: &str) -> PathBuf {
    self.logs_dir().join(format!("{name}.log"))
  }

  /// Cache location for a downloaded archive, keyed by name, version and filename.
  pub fn cache_path(&self, name: &str, version: &str, filename: &str) -> PathBuf {
    self.downloads_dir().join(name).join(version).join(filename)
  }

  pub fn git_cache_path(&self, name: &str, rev: &str) -> PathBuf {
    self.downloads_dir().join("git").join(format!("{name}-{}", sanitize(rev)))
  }

  pub fn stage_path(&self, name: &str) -> PathBuf {
    self.staging_dir().join(name)
  }

  pub fn marker_path(&self, name: &str) -> PathBuf {
    self.markers_dir().join(format!("{MARKER_PREFIX}{name}"))
  }

  /// Scratch directory an archive is unpacked into before promotion to `src/`.
  pub fn unpack_path(&self, name: &str) -> PathBuf {
    self.work_dir().join("unpack").join(name)
  }

  pub fn package_work_path(&self, name: &str) -> PathBuf {
    self.work_dir().join("pkg").join(name)
  }
}

/// Replace characters that are awkward in directory names (`/` in branch names).
pub fn sanitize(value: &str) -> String {
  value
    .chars()
    .map(|c| {
      if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '+') {
        c
      } else {
        '_'
      }
    })
    .collect()
}

/// Remove `path` if present and recreate it empty.
pub fn fresh_dir(path: &Path) -> io::Result<()> {
  match std::fs::remove_dir_all(path) {
    Ok(()) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(e),
  }
  std::fs::create_dir_all(path)
}
