//! Archive extraction into the build root.
//!
//! An archive is unpacked into a scratch directory, its top-level directory is
//! identified from the archive's contents, checked against the component name
//! and then moved to `src/<dir>`. `.tar`, `.tar.gz`/`.tgz` and `.zip` are
//! handled in-process; anything else goes to the external `tar`.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use thiserror::Error;
use tracing::{debug, info};

use crate::buildlog::BuildLog;
use crate::execute::{ExecuteError, Invocation, Runner};
use crate::root::fresh_dir;

#[derive(Debug, Error)]
pub enum ExtractError {
  #[error("failed to read archive '{path}': {message}")]
  Archive { path: PathBuf, message: String },

  #[error("archive '{path}' has no top-level directory")]
  NoTopLevel { path: PathBuf },

  /// The archive unpacks to a directory unrelated to the component.
  #[error("archive top-level directory '{found}' does not match component '{expected}'")]
  NameMismatch { expected: String, found: String },

  #[error("external extraction failed: {0}")]
  Tool(#[from] ExecuteError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// How an archive is unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
  Tar,
  TarGz,
  Zip,
  /// Delegated to the external archive tool.
  External,
}

impl ArchiveFormat {
  pub fn detect(path: &Path) -> Self {
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().to_ascii_lowercase())
      .unwrap_or_default();

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
      ArchiveFormat::TarGz
    } else if name.ends_with(".tar") {
      ArchiveFormat::Tar
    } else if name.ends_with(".zip") {
      ArchiveFormat::Zip
    } else {
      ArchiveFormat::External
    }
  }
}

/// Extract `archive` for component `name` and return the promoted source tree.
///
/// `scratch` is recreated empty; the identified top-level directory ends up at
/// `src_dir/<top>`, replacing any tree already there.
pub async fn extract<R: Runner>(
  archive: &Path,
  name: &str,
  scratch: &Path,
  src_dir: &Path,
  runner: &R,
  log: &BuildLog,
) -> Result<PathBuf, ExtractError> {
  fresh_dir(scratch)?;
  let format = ArchiveFormat::detect(archive);
  debug!(archive = %archive.display(), ?format, "extracting");
  log.step(&format!("extracting {}", archive.display()));

  let top = match format {
    ArchiveFormat::External => {
      let invocation = Invocation::new("tar")
        .arg("-xf")
        .arg(archive.display().to_string())
        .arg("-C")
        .arg(scratch.display().to_string());
      runner.run(&invocation, log.path()).await?;
      single_top_level(scratch).ok_or_else(|| ExtractError::NoTopLevel {
        path: archive.to_path_buf(),
      })?
    }
    native => {
      let archive = archive.to_path_buf();
      let scratch = scratch.to_path_buf();
      tokio::task::spawn_blocking(move || unpack_native(native, &archive, &scratch))
        .await
        .map_err(|e| ExtractError::Io(std::io::Error::other(e)))??
    }
  };

  if !loosely_matches(&top, name) {
    let _ = fs::remove_dir_all(scratch);
    return Err(ExtractError::NameMismatch {
      expected: name.to_string(),
      found: top,
    });
  }

  let unpacked = scratch.join(&top);
  if !unpacked.is_dir() {
    return Err(ExtractError::NoTopLevel {
      path: archive.to_path_buf(),
    });
  }

  let dest = src_dir.join(&top);
  promote(&unpacked, &dest)?;
  let _ = fs::remove_dir_all(scratch);

  info!(dir = %dest.display(), "source extracted");
  log.step(&format!("source tree {}", dest.display()));
  Ok(dest)
}

/// Whether `dir` loosely contains `name`: both are lowercased and reduced to
/// ASCII alphanumerics first, so `gtk+-3.24.0` matches `gtk+` and `libX11-1.8`
/// matches `libx11`.
pub fn loosely_matches(dir: &str, name: &str) -> bool {
  fn normalize(s: &str) -> String {
    s.chars()
      .filter(|c| c.is_ascii_alphanumeric())
      .map(|c| c.to_ascii_lowercase())
      .collect()
  }
  normalize(dir).contains(&normalize(name))
}

fn unpack_native(format: ArchiveFormat, archive: &Path, dest: &Path) -> Result<String, ExtractError> {
  let file = File::open(archive)?;
  let top = match format {
    ArchiveFormat::TarGz => unpack_tar(Archive::new(GzDecoder::new(BufReader::new(file))), dest),
    ArchiveFormat::Tar => unpack_tar(Archive::new(BufReader::new(file)), dest),
    ArchiveFormat::Zip => unpack_zip(file, dest),
    ArchiveFormat::External => Err(std::io::Error::other("not an in-process archive format")),
  }
  .map_err(|e| ExtractError::Archive {
    path: archive.to_path_buf(),
    message: e.to_string(),
  })?;

  top.ok_or_else(|| ExtractError::NoTopLevel {
    path: archive.to_path_buf(),
  })
}

fn unpack_tar<R: std::io::Read>(mut archive: Archive<R>, dest: &Path) -> std::io::Result<Option<String>> {
  archive.set_preserve_permissions(true);
  let mut top = None;

  for entry in archive.entries()? {
    let mut entry = entry?;
    if matches!(
      entry.header().entry_type(),
      EntryType::XGlobalHeader | EntryType::XHeader
    ) {
      continue;
    }

    if top.is_none() {
      top = first_component(&entry.path()?);
    }
    entry.unpack_in(dest)?;
  }

  Ok(top)
}

fn unpack_zip(file: File, dest: &Path) -> std::io::Result<Option<String>> {
  let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(std::io::Error::other)?;
  let mut top = None;

  for i in 0..archive.len() {
    let mut entry = archive.by_index(i).map_err(std::io::Error::other)?;
    let Some(path) = entry.enclosed_name() else {
      return Err(std::io::Error::other(format!("unsafe zip entry name '{}'", entry.name())));
    };

    if top.is_none() {
      top = first_component(&path);
    }

    let dest_path = dest.join(&path);
    if entry.is_dir() {
      fs::create_dir_all(&dest_path)?;
      continue;
    }

    if let Some(parent) = dest_path.parent() {
      fs::create_dir_all(parent)?;
    }
    let mut out = File::create(&dest_path)?;
    std::io::copy(&mut entry, &mut out)?;

    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      if let Some(mode) = entry.unix_mode() {
        fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode))?;
      }
    }
  }

  Ok(top)
}

fn first_component(path: &Path) -> Option<String> {
  path.components().find_map(|c| match c {
    Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
    _ => None,
  })
}

/// The only directory in `dir`, if it holds exactly one entry and that entry is a directory.
fn single_top_level(dir: &Path) -> Option<String> {
  let mut entries = fs::read_dir(dir).ok()?.flatten();
  let first = entries.next()?;
  if entries.next().is_some() || !first.file_type().ok()?.is_dir() {
    return None;
  }
  Some(first.file_name().to_string_lossy().into_owned())
}

fn promote(from: &Path, to: &Path) -> std::io::Result<()> {
  match fs::remove_dir_all(to) {
    Ok(()) => debug!(dir = %to.display(), "replaced previous source tree"),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
    Err(e) => return Err(e),
  }
  if let Some(parent) = to.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::rename(from, to)
}
