//! Tree copy and size helpers.

use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Recursively copy the contents of `from` into `to`, overwriting files.
///
/// Symlinks are recreated rather than followed. Entries for which `skip`
/// returns true (matched on the path relative to `from`) are not copied, and
/// neither is anything beneath them.
pub fn copy_tree<F>(from: &Path, to: &Path, skip: F) -> io::Result<u64>
where
  F: Fn(&Path) -> bool,
{
  std::fs::create_dir_all(to)?;
  let mut copied = 0;

  let walker = WalkDir::new(from).min_depth(1).follow_links(false).into_iter();
  for entry in walker.filter_entry(|e| e.path().strip_prefix(from).map(|rel| !skip(rel)).unwrap_or(true)) {
    let entry = entry.map_err(io::Error::other)?;
    let relative = entry.path().strip_prefix(from).map_err(io::Error::other)?;
    let dest = to.join(relative);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      std::fs::create_dir_all(&dest)?;
    } else if file_type.is_symlink() {
      let target = std::fs::read_link(entry.path())?;
      remove_existing(&dest)?;
      symlink(&target, &dest)?;
      copied += 1;
    } else {
      if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
      }
      remove_existing(&dest)?;
      std::fs::copy(entry.path(), &dest)?;
      copied += 1;
    }
  }

  Ok(copied)
}

fn remove_existing(path: &Path) -> io::Result<()> {
  match std::fs::symlink_metadata(path) {
    Ok(meta) if meta.is_dir() => Ok(()),
    Ok(_) => std::fs::remove_file(path),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::windows::fs::symlink_file(target, link)
}

/// Total size in bytes of regular files below `path` (symlinks not followed).
pub fn dir_size(path: &Path) -> u64 {
  WalkDir::new(path)
    .follow_links(false)
    .into_iter()
    .flatten()
    .filter(|e| e.file_type().is_file())
    .filter_map(|e| e.metadata().ok())
    .map(|m| m.len())
    .sum()
}

/// Whether `path` is a directory with no entries (or does not exist).
pub fn is_empty_dir(path: &Path) -> bool {
  std::fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(true)
}
