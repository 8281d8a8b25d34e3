//! Source retrieval with bounded retry.
//!
//! Tarballs are downloaded into the build root's cache at
//! `downloads/<name>/<version>/<file>` and reused on later runs. A download
//! streams into `<file>.part` and is renamed into place only once complete and
//! verified, so a failed attempt never leaves something that looks like a
//! cache hit.

pub mod git;

use std::future::Future;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::buildlog::BuildLog;
use crate::manifest::FetchSettings;

/// Errors that can occur while retrieving sources.
#[derive(Debug, Error)]
pub enum FetchError {
  /// Every attempt failed with a transient error.
  #[error("fetching {what} failed after {attempts} attempt(s): {message}")]
  Exhausted {
    what: String,
    attempts: u32,
    message: String,
  },

  /// The server reported success but delivered nothing.
  #[error("download of {url} produced an empty file")]
  Empty { url: String },

  /// SHA256 hash mismatch after download.
  #[error("hash mismatch for {url}: expected {expected}, got {actual}")]
  HashMismatch {
    url: String,
    expected: String,
    actual: String,
  },

  /// The clone request itself is unusable (for example an invalid rev).
  #[error(transparent)]
  Git(git::CloneError),

  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl FetchError {
  /// Integrity failures are never retried.
  pub fn is_integrity(&self) -> bool {
    matches!(self, FetchError::Empty { .. } | FetchError::HashMismatch { .. })
  }
}

/// Outcome of one attempt.
#[derive(Debug)]
pub enum Attempt {
  /// Worth retrying (network error, timeout, HTTP error status).
  Transient(String),
  /// Not worth retrying.
  Fatal(FetchError),
}

impl From<std::io::Error> for Attempt {
  fn from(e: std::io::Error) -> Self {
    Attempt::Fatal(FetchError::Io(e))
  }
}

/// What a fetch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
  /// A usable cache entry was found; nothing was downloaded.
  Cached,
  Downloaded { attempts: u32, bytes: u64 },
}

/// Run `op` up to `settings.attempts` times, sleeping `retry_delay` between
/// transient failures. `op` receives the 1-based attempt number.
pub async fn retry<T, F, Fut>(
  settings: &FetchSettings,
  what: &str,
  log: &BuildLog,
  mut op: F,
) -> Result<(T, u32), FetchError>
where
  F: FnMut(u32) -> Fut,
  Fut: Future<Output = Result<T, Attempt>>,
{
  let attempts = settings.attempts.max(1);
  let mut last_message = String::new();

  for attempt in 1..=attempts {
    match op(attempt).await {
      Ok(value) => return Ok((value, attempt)),
      Err(Attempt::Fatal(e)) => return Err(e),
      Err(Attempt::Transient(message)) => {
        warn!(what, attempt, attempts, error = %message, "fetch attempt failed");
        log.step(&format!("fetch attempt {attempt}/{attempts} failed: {message}"));
        last_message = message;
        if attempt < attempts {
          tokio::time::sleep(settings.retry_delay()).await;
        }
      }
    }
  }

  Err(FetchError::Exhausted {
    what: what.to_string(),
    attempts,
    message: last_message,
  })
}

/// Build the HTTP client used for every download in a run.
pub fn http_client(settings: &FetchSettings) -> Result<reqwest::Client, FetchError> {
  reqwest::Client::builder()
    .timeout(settings.timeout())
    .user_agent(concat!("stagehand/", env!("CARGO_PKG_VERSION")))
    .build()
    .map_err(FetchError::Client)
}

/// Fetch `url` into `dest`, reusing `dest` if it is a valid cache entry.
///
/// A cache entry is valid when it is non-empty and, if `sha256` is given,
/// matches it. On failure neither `dest` nor its partial file remain.
pub async fn fetch_archive(
  client: &reqwest::Client,
  settings: &FetchSettings,
  url: &str,
  sha256: Option<&str>,
  dest: &Path,
  log: &BuildLog,
) -> Result<FetchOutcome, FetchError> {
  if is_valid_cache_entry(dest, sha256).await {
    info!(path = %dest.display(), "using cached archive");
    log.step(&format!("using cached {}", dest.display()));
    return Ok(FetchOutcome::Cached);
  }

  if let Some(parent) = dest.parent() {
    fs::create_dir_all(parent).await?;
  }
  let part = part_path(dest);

  info!(url = %url, "fetching URL");
  log.step(&format!("fetching {url}"));

  let result = retry(settings, url, log, |_| async {
    let result = download_once(client, url, &part).await;
    if result.is_err() {
      remove_if_exists(&part).await;
    }
    result
  })
  .await;

  let (bytes, attempts) = match result {
    Ok(ok) => ok,
    Err(e) => {
      remove_if_exists(&part).await;
      remove_if_exists(dest).await;
      return Err(e);
    }
  };

  if let Some(expected) = sha256 {
    let actual = hash_file(&part).await?;
    if !actual.eq_ignore_ascii_case(expected) {
      remove_if_exists(&part).await;
      remove_if_exists(dest).await;
      return Err(FetchError::HashMismatch {
        url: url.to_string(),
        expected: expected.to_string(),
        actual,
      });
    }
    debug!(url = %url, "hash verified");
  }

  fs::rename(&part, dest).await?;

  info!(path = %dest.display(), size = bytes, attempts, "download complete");
  log.step(&format!("downloaded {bytes} bytes in {attempts} attempt(s)"));

  Ok(FetchOutcome::Downloaded { attempts, bytes })
}

async fn download_once(client: &reqwest::Client, url: &str, part: &Path) -> Result<u64, Attempt> {
  let mut response = client
    .get(url)
    .send()
    .await
    .map_err(|e| Attempt::Transient(e.to_string()))?;

  if !response.status().is_success() {
    return Err(Attempt::Transient(format!("HTTP {}", response.status())));
  }

  let mut file = fs::File::create(part).await?;
  let mut bytes = 0u64;
  while let Some(chunk) = response.chunk().await.map_err(|e| Attempt::Transient(e.to_string()))? {
    file.write_all(&chunk).await?;
    bytes += chunk.len() as u64;
  }
  file.flush().await?;

  if bytes == 0 {
    return Err(Attempt::Fatal(FetchError::Empty { url: url.to_string() }));
  }

  Ok(bytes)
}

async fn is_valid_cache_entry(path: &Path, sha256: Option<&str>) -> bool {
  let Ok(meta) = fs::metadata(path).await else {
    return false;
  };
  if !meta.is_file() || meta.len() == 0 {
    debug!(path = %path.display(), "ignoring empty cache entry");
    return false;
  }

  match sha256 {
    None => true,
    Some(expected) => match hash_file(path).await {
      Ok(actual) if actual.eq_ignore_ascii_case(expected) => true,
      Ok(actual) => {
        debug!(expected = %expected, actual = %actual, "cached file hash mismatch, re-downloading");
        false
      }
      Err(_) => false,
    },
  }
}

pub(crate) fn part_path(dest: &Path) -> PathBuf {
  let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  name.push(".part");
  dest.with_file_name(name)
}

async fn remove_if_exists(path: &Path) {
  if let Err(e) = fs::remove_file(path).await
    && e.kind() != std::io::ErrorKind::NotFound
  {
    warn!(path = %path.display(), error = %e, "failed to remove partial download");
  }
}

/// Compute the SHA-256 of a file, reading it in 8 KiB chunks.
pub async fn hash_file(path: &Path) -> Result<String, std::io::Error> {
  let mut file = fs::File::open(path).await?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];
  loop {
    let n = file.read(&mut buffer).await?;
    if n == 0 {
      break;
    }
    hasher.update(&buffer[..n]);
  }
  Ok(hex::encode(hasher.finalize()))
}

/// Convert a URL to a safe filename.
///
/// Takes the last path component and sanitizes it. Falls back to hash of URL
/// if no suitable filename can be extracted.
pub fn url_to_filename(url: &str) -> String {
  let path = url.split(['?', '#']).next().unwrap_or(url);
  if let Some(filename) = path.rsplit('/').next() {
    let sanitized: String = filename
      .chars()
      .map(|c| {
        if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '+' {
          c
        } else {
          '_'
        }
      })
      .collect();

    if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
      return sanitized;
    }
  }

  let mut hasher = Sha256::new();
  hasher.update(url.as_bytes());
  format!("download_{}", &hex::encode(hasher.finalize())[..16])
}
