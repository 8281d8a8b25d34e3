//! Git sources.
//!
//! A component's repository is shallow-cloned at its branch or tag into
//! `downloads/git/<name>-<rev>/`, with `.git` intact so later runs reuse it.
//! The cache directory only ever appears fully checked out.
//! The build works on a copy without `.git` under `src/`.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::{Attempt, FetchError, part_path, retry};
use crate::buildlog::BuildLog;
use crate::manifest::FetchSettings;
use crate::root::{fresh_dir, sanitize};
use crate::util::fs::copy_tree;

/// Errors from a single clone attempt.
#[derive(Debug, Error)]
pub enum CloneError {
  #[error("failed to prepare clone of '{url}': {source}")]
  Prepare {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("'{rev}' is not a valid branch or tag name: {source}")]
  InvalidRev {
    rev: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("failed to clone repository '{url}': {source}")]
  Clone {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("failed to checkout revision '{rev}': {source}")]
  Checkout {
    rev: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl CloneError {
  fn is_transient(&self) -> bool {
    !matches!(self, CloneError::InvalidRev { .. })
  }
}

/// Ensure a checkout of `url` at `rev` exists at `cache`, cloning with retry if absent.
///
/// Each attempt clones into `<cache>.part`, which is renamed into place only
/// after the worktree is checked out. Returns true when an existing checkout
/// was reused.
pub async fn ensure_checkout(
  settings: &FetchSettings,
  url: &str,
  rev: &str,
  cache: &Path,
  log: &BuildLog,
) -> Result<bool, FetchError> {
  if is_complete_checkout(cache) {
    info!(path = %cache.display(), "using cached checkout");
    log.step(&format!("using cached checkout {}", cache.display()));
    return Ok(true);
  }

  if cache.exists() {
    warn!(path = %cache.display(), "discarding incomplete checkout");
    log.step(&format!("discarding incomplete checkout {}", cache.display()));
    tokio::fs::remove_dir_all(cache).await?;
  }
  if let Some(parent) = cache.parent() {
    tokio::fs::create_dir_all(parent).await?;
  }

  info!(url, rev, path = %cache.display(), "cloning repository");
  log.step(&format!("cloning {url} at {rev}"));

  let part = part_path(cache);
  let what = format!("{url}@{rev}");
  let result = retry(settings, &what, log, |_| {
    let url = url.to_string();
    let rev = rev.to_string();
    let part = part.clone();
    async move {
      let dest = part.clone();
      let outcome = tokio::task::spawn_blocking(move || {
        remove_partial(&dest);
        clone_at(&url, &rev, &dest)
      })
      .await
      .map_err(|e| Attempt::Fatal(FetchError::Io(std::io::Error::other(e))))?;

      match outcome {
        Ok(()) => Ok(()),
        Err(e) => {
          remove_partial(&part);
          if e.is_transient() {
            Err(Attempt::Transient(e.to_string()))
          } else {
            Err(Attempt::Fatal(FetchError::Git(e)))
          }
        }
      }
    }
  })
  .await;

  match result {
    Ok(((), attempts)) => {
      if let Err(e) = tokio::fs::rename(&part, cache).await {
        remove_partial(&part);
        return Err(e.into());
      }
      log.step(&format!("cloned in {attempts} attempt(s)"));
      Ok(false)
    }
    Err(e) => {
      remove_partial(&part);
      Err(e)
    }
  }
}

/// A usable checkout has a repository and at least one worktree entry.
fn is_complete_checkout(cache: &Path) -> bool {
  if !cache.join(".git").is_dir() {
    return false;
  }
  std::fs::read_dir(cache)
    .map(|entries| entries.flatten().any(|e| e.file_name() != ".git"))
    .unwrap_or(false)
}

/// Shallow-clone `url` with `rev` checked out into `dest`.
pub fn clone_at(url: &str, rev: &str, dest: &Path) -> Result<(), CloneError> {
  let prepared = gix::prepare_clone(url, dest).map_err(|e| CloneError::Prepare {
    url: url.to_string(),
    source: Box::new(e),
  })?;

  let mut prepared = prepared
    .with_ref_name(Some(rev))
    .map_err(|e| CloneError::InvalidRev {
      rev: rev.to_string(),
      source: Box::new(e),
    })?
    .with_shallow(gix::remote::fetch::Shallow::DepthAtRemote(NonZeroU32::MIN));

  let (mut checkout, _outcome) = prepared
    .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| CloneError::Clone {
      url: url.to_string(),
      source: Box::new(e),
    })?;

  checkout
    .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| CloneError::Checkout {
      rev: rev.to_string(),
      source: Box::new(e),
    })?;

  debug!(url, rev, path = %dest.display(), "checkout complete");
  Ok(())
}

/// Copy a cached checkout into a fresh `src_dir/<name>-<rev>`, leaving out `.git`.
pub fn materialize(cache: &Path, src_dir: &Path, name: &str, rev: &str) -> std::io::Result<PathBuf> {
  let dest = src_dir.join(format!("{name}-{}", sanitize(rev)));
  fresh_dir(&dest)?;
  let copied = copy_tree(cache, &dest, |rel| rel.starts_with(".git"))?;
  debug!(from = %cache.display(), to = %dest.display(), files = copied, "materialized checkout");
  Ok(dest)
}

/// A failed clone may leave a repository without a worktree behind.
fn remove_partial(path: &Path) {
  if path.exists() {
    let _ = std::fs::remove_dir_all(path);
  }
}
