//! The component manifest: build settings plus the ordered component list.
//!
//! A manifest is a TOML file:
//!
//! ```toml
//! [build]
//! prefix = "/usr/local"
//!
//! [[component]]
//! name = "pixman"
//! version = "0.42.2"
//! source = { kind = "tarball", url = "https://www.cairographics.org/releases/pixman-0.42.2.tar.gz" }
//! ```
//!
//! List order is build order unless dependency enforcement is enabled.

mod settings;

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::component::{BuildStrategy, ComponentSpec};

pub use settings::{FetchSettings, HostRequirements, PackageSettings, Prerequisites, Settings, join_rooted};

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read manifest '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse manifest '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: Box<toml::de::Error>,
  },

  #[error("component #{index} has an empty name")]
  EmptyName { index: usize },

  #[error("component '{0}' has an empty version")]
  EmptyVersion(String),

  #[error("component name '{0}' may only contain letters, digits, '.', '_', '+' and '-'")]
  InvalidName(String),

  #[error("component '{name}' has version '{version}', which is not a single path-safe version string")]
  InvalidVersion { name: String, version: String },

  #[error("component '{0}' is declared more than once")]
  DuplicateName(String),

  #[error("component '{name}' patches '{file}', which is not a relative path inside the source tree")]
  InvalidPatchPath { name: String, file: PathBuf },

  #[error("component '{name}' install_dir '{dir}' must be relative and stay inside the prefix")]
  InvalidInstallDir { name: String, dir: String },

  #[error("prefix must be an absolute path, got '{0}'")]
  RelativePrefix(PathBuf),

  #[error("fetch.attempts must be at least 1")]
  ZeroAttempts,
}

/// A parsed and validated manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
  #[serde(default, rename = "build")]
  pub settings: Settings,
  #[serde(default)]
  pub fetch: FetchSettings,
  #[serde(default)]
  pub package: PackageSettings,
  #[serde(default)]
  pub host: HostRequirements,
  #[serde(default)]
  pub prerequisites: Option<Prerequisites>,
  #[serde(default, rename = "component")]
  pub components: Vec<ComponentSpec>,
}

impl Manifest {
  /// Load a manifest from disk, resolving a relative build root against the
  /// manifest's directory.
  pub fn load(path: &Path) -> Result<Self, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    let mut manifest = Self::parse(&content).map_err(|source| match source {
      ManifestError::Parse { source, .. } => ManifestError::Parse {
        path: path.to_path_buf(),
        source,
      },
      other => other,
    })?;

    if manifest.settings.root.is_relative() {
      let base = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
      manifest.settings.root = base.join(&manifest.settings.root);
    }

    Ok(manifest)
  }

  /// Parse and validate manifest text.
  pub fn parse(content: &str) -> Result<Self, ManifestError> {
    let manifest: Manifest = toml::from_str(content).map_err(|source| ManifestError::Parse {
      path: PathBuf::new(),
      source: Box::new(source),
    })?;
    manifest.validate()?;
    Ok(manifest)
  }

  pub fn validate(&self) -> Result<(), ManifestError> {
    if !self.settings.prefix.is_absolute() {
      return Err(ManifestError::RelativePrefix(self.settings.prefix.clone()));
    }
    if self.fetch.attempts == 0 {
      return Err(ManifestError::ZeroAttempts);
    }

    let mut seen = HashSet::new();
    for (index, component) in self.components.iter().enumerate() {
      validate_component(index, component)?;
      if !seen.insert(component.name.as_str()) {
        return Err(ManifestError::DuplicateName(component.name.clone()));
      }
    }

    Ok(())
  }

  pub fn component(&self, name: &str) -> Option<&ComponentSpec> {
    self.components.iter().find(|c| c.name == name)
  }
}

/// Names become file names (markers, logs, stage directories).
pub fn is_valid_name(name: &str) -> bool {
  !name.is_empty()
    && name != "."
    && name != ".."
    && name
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'))
}

/// Versions become path components too (cache directories, package file names).
pub fn is_valid_version(version: &str) -> bool {
  !version.is_empty()
    && !version.contains("..")
    && version
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-' | '~' | ':'))
}

fn is_contained_relative(path: &Path) -> bool {
  !path.as_os_str().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn validate_component(index: usize, component: &ComponentSpec) -> Result<(), ManifestError> {
  if component.name.is_empty() {
    return Err(ManifestError::EmptyName { index });
  }
  if !is_valid_name(&component.name) {
    return Err(ManifestError::InvalidName(component.name.clone()));
  }
  if component.version.trim().is_empty() {
    return Err(ManifestError::EmptyVersion(component.name.clone()));
  }
  if !is_valid_version(&component.version) {
    return Err(ManifestError::InvalidVersion {
      name: component.name.clone(),
      version: component.version.clone(),
    });
  }

  for patch in &component.patches {
    if !is_contained_relative(&patch.file) {
      return Err(ManifestError::InvalidPatchPath {
        name: component.name.clone(),
        file: patch.file.clone(),
      });
    }
  }

  if component.strategy == BuildStrategy::Copy && !is_contained_relative(Path::new(&component.install_dir())) {
    return Err(ManifestError::InvalidInstallDir {
      name: component.name.clone(),
      dir: component.install_dir(),
    });
  }

  Ok(())
}
