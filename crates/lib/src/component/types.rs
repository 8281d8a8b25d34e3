use std::fmt;

use serde::{Deserialize, Serialize};

use super::patch::TextPatch;

/// Where a component's source comes from.
///
/// Exactly one origin per component: the tag makes "both" and "neither"
/// unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Source {
  /// A source archive downloaded over HTTP(S).
  Tarball {
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sha256: Option<String>,
  },
  /// A git repository checked out at a branch or tag.
  Git { url: String, rev: String },
}

impl fmt::Display for Source {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Source::Tarball { url, .. } => write!(f, "{url}"),
      Source::Git { url, rev } => write!(f, "{url}@{rev}"),
    }
  }
}

/// Which build-system adapter drives configure, compile and install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStrategy {
  /// `./configure && make && make install`.
  #[default]
  Configure,
  /// CMake generating Ninja files, driven by `ninja`.
  Ninja,
  /// `meson setup`, `meson compile`, `meson install`.
  Meson,
  /// No compilation: the source tree is installed verbatim (fonts, themes, data).
  Copy,
}

impl BuildStrategy {
  pub fn as_str(self) -> &'static str {
    match self {
      BuildStrategy::Configure => "configure",
      BuildStrategy::Ninja => "ninja",
      BuildStrategy::Meson => "meson",
      BuildStrategy::Copy => "copy",
    }
  }
}

impl fmt::Display for BuildStrategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One buildable third-party unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentSpec {
  pub name: String,
  pub version: String,
  pub source: Source,
  #[serde(default)]
  pub strategy: BuildStrategy,
  /// Extra flags appended to the strategy's configure step.
  #[serde(default)]
  pub flags: Vec<String>,
  #[serde(default, rename = "patch")]
  pub patches: Vec<TextPatch>,
  /// Declared dependencies. Always recorded in package metadata; only
  /// enforced when the run enables dependency enforcement.
  #[serde(default)]
  pub depends: Vec<String>,
  /// Copy the stage tree onto the live prefix after a successful install.
  #[serde(default)]
  pub merge_into_prefix: bool,
  #[serde(default)]
  pub description: Option<String>,
  /// Destination below the prefix for the `copy` strategy.
  #[serde(default)]
  pub install_dir: Option<String>,
}

impl ComponentSpec {
  pub fn new(name: &str, version: &str, source: Source) -> Self {
    Self {
      name: name.to_string(),
      version: version.to_string(),
      source,
      strategy: BuildStrategy::default(),
      flags: Vec::new(),
      patches: Vec::new(),
      depends: Vec::new(),
      merge_into_prefix: false,
      description: None,
      install_dir: None,
    }
  }

  pub fn tarball(name: &str, version: &str, url: &str) -> Self {
    Self::new(
      name,
      version,
      Source::Tarball {
        url: url.to_string(),
        sha256: None,
      },
    )
  }

  pub fn git(name: &str, version: &str, url: &str, rev: &str) -> Self {
    Self::new(
      name,
      version,
      Source::Git {
        url: url.to_string(),
        rev: rev.to_string(),
      },
    )
  }

  pub fn with_strategy(mut self, strategy: BuildStrategy) -> Self {
    self.strategy = strategy;
    self
  }

  pub fn with_flags<I, S>(mut self, flags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.flags = flags.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_patch(mut self, patch: TextPatch) -> Self {
    self.patches.push(patch);
    self
  }

  pub fn with_depends<I, S>(mut self, depends: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.depends = depends.into_iter().map(Into::into).collect();
    self
  }

  pub fn merged_into_prefix(mut self) -> Self {
    self.merge_into_prefix = true;
    self
  }

  /// Install directory for the `copy` strategy, relative to the prefix.
  pub fn install_dir(&self) -> String {
    self
      .install_dir
      .clone()
      .unwrap_or_else(|| format!("share/{}", self.name))
  }

  pub fn description(&self) -> String {
    self
      .description
      .clone()
      .unwrap_or_else(|| format!("{} {}", self.name, self.version))
  }
}
