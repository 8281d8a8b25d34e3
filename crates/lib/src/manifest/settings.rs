//! Immutable run configuration.
//!
//! Everything an adapter needs (paths, flags, job count) lives in [`Settings`]
//! and is passed explicitly; nothing is read from the process environment.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_root() -> PathBuf {
  PathBuf::from(crate::consts::DEFAULT_ROOT)
}

fn default_prefix() -> PathBuf {
  PathBuf::from("/usr/local")
}

fn default_sysroot() -> PathBuf {
  PathBuf::from("/")
}

fn default_arch() -> String {
  std::env::consts::ARCH.to_string()
}

fn default_log_tail_lines() -> usize {
  20
}

/// Global build configuration (`[build]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
  /// Build root holding downloads, sources, stages, logs and markers.
  #[serde(default = "default_root")]
  pub root: PathBuf,
  /// Shared install prefix every component is configured for.
  #[serde(default = "default_prefix")]
  pub prefix: PathBuf,
  /// Filesystem root the prefix lives under; stage trees merge onto it.
  #[serde(default = "default_sysroot")]
  pub sysroot: PathBuf,
  /// Parallel jobs handed to the build tools. `0` means available cores.
  #[serde(default)]
  pub jobs: usize,
  /// Package architecture string.
  #[serde(default = "default_arch")]
  pub arch: String,
  /// Optional `--host` triple for configure-based builds.
  #[serde(default)]
  pub host: Option<String>,
  #[serde(default)]
  pub cflags: String,
  #[serde(default)]
  pub cxxflags: String,
  #[serde(default)]
  pub ldflags: String,
  /// Flags passed to every configure-based build before component flags.
  #[serde(default)]
  pub configure_flags: Vec<String>,
  /// Extra environment for every build step.
  #[serde(default)]
  pub env: BTreeMap<String, String>,
  /// Treat `depends` as ordering constraints instead of metadata only.
  #[serde(default)]
  pub enforce_dependencies: bool,
  /// Lines of the component log surfaced when a component fails.
  #[serde(default = "default_log_tail_lines")]
  pub log_tail_lines: usize,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      root: default_root(),
      prefix: default_prefix(),
      sysroot: default_sysroot(),
      jobs: 0,
      arch: default_arch(),
      host: None,
      cflags: String::new(),
      cxxflags: String::new(),
      ldflags: String::new(),
      configure_flags: Vec::new(),
      env: BTreeMap::new(),
      enforce_dependencies: false,
      log_tail_lines: default_log_tail_lines(),
    }
  }
}

impl Settings {
  /// Resolved job count, never zero.
  pub fn jobs(&self) -> usize {
    if self.jobs > 0 {
      self.jobs
    } else {
      std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
    }
  }

  /// The live prefix as seen from this machine (`sysroot` + `prefix`).
  pub fn live_prefix(&self) -> PathBuf {
    join_rooted(&self.sysroot, &self.prefix)
  }

  /// `PKG_CONFIG_PATH` pointing at the live prefix.
  pub fn pkg_config_path(&self) -> String {
    let live = self.live_prefix();
    format!(
      "{}:{}",
      live.join("lib").join("pkgconfig").display(),
      live.join("share").join("pkgconfig").display()
    )
  }
}

/// Join an absolute path below another root (`/stage` + `/usr/local` = `/stage/usr/local`).
pub fn join_rooted(root: &std::path::Path, path: &std::path::Path) -> PathBuf {
  let relative: PathBuf = path
    .components()
    .filter(|c| matches!(c, std::path::Component::Normal(_)))
    .collect();
  root.join(relative)
}

fn default_attempts() -> u32 {
  3
}

fn default_retry_delay_secs() -> u64 {
  5
}

fn default_timeout_secs() -> u64 {
  300
}

/// Download retry policy (`[fetch]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchSettings {
  #[serde(default = "default_attempts")]
  pub attempts: u32,
  #[serde(default = "default_retry_delay_secs")]
  pub retry_delay_secs: u64,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for FetchSettings {
  fn default() -> Self {
    Self {
      attempts: default_attempts(),
      retry_delay_secs: default_retry_delay_secs(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl FetchSettings {
  pub fn retry_delay(&self) -> Duration {
    Duration::from_secs(self.retry_delay_secs)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

fn default_package_tool() -> Vec<String> {
  vec!["dpkg-deb".into(), "--build".into(), "--root-owner-group".into()]
}

fn default_maintainer() -> String {
  "stagehand <builder@localhost>".to_string()
}

fn default_section() -> String {
  "misc".to_string()
}

fn default_priority() -> String {
  "optional".to_string()
}

fn yes() -> bool {
  true
}

/// Packaging step configuration (`[package]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSettings {
  #[serde(default = "yes")]
  pub enabled: bool,
  /// Package tool command; the package directory and output path are appended.
  #[serde(default = "default_package_tool")]
  pub tool: Vec<String>,
  #[serde(default = "default_maintainer")]
  pub maintainer: String,
  #[serde(default = "default_section")]
  pub section: String,
  #[serde(default = "default_priority")]
  pub priority: String,
}

impl Default for PackageSettings {
  fn default() -> Self {
    Self {
      enabled: true,
      tool: default_package_tool(),
      maintainer: default_maintainer(),
      section: default_section(),
      priority: default_priority(),
    }
  }
}

/// Host environment requirements checked before any component runs (`[host]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostRequirements {
  /// Environment variables that must be set.
  #[serde(default)]
  pub env: Vec<String>,
  /// Paths that must exist.
  #[serde(default)]
  pub paths: Vec<PathBuf>,
}

/// Prerequisite packages installed once through the system package manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Prerequisites {
  /// Package manager command; package names are appended.
  pub command: Vec<String>,
  #[serde(default)]
  pub packages: Vec<String>,
}
