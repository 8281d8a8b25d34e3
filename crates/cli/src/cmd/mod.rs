mod build;
mod clean;
mod status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use stagehand_lib::manifest::Manifest;

pub use build::{BuildArgs, cmd_build};
pub use clean::cmd_clean;
pub use status::cmd_status;

/// Load the manifest at `config`, applying a `--root` override.
fn load_manifest(config: &Path, root: Option<&Path>) -> Result<Manifest> {
  let mut manifest =
    Manifest::load(config).with_context(|| format!("Failed to load manifest '{}'", config.display()))?;
  if let Some(root) = root {
    manifest.settings.root = root.to_path_buf();
  }
  Ok(manifest)
}

/// The build root for commands that work without a readable manifest.
///
/// An explicit `--root` wins; otherwise the manifest's root is used, falling
/// back to `build` next to the manifest path.
fn resolve_root(config: &Path, root: Option<&Path>) -> (Option<Manifest>, PathBuf) {
  let manifest = Manifest::load(config).ok();
  let path = match (root, &manifest) {
    (Some(root), _) => root.to_path_buf(),
    (None, Some(manifest)) => manifest.settings.root.clone(),
    (None, None) => config
      .parent()
      .filter(|p| !p.as_os_str().is_empty())
      .unwrap_or(Path::new("."))
      .join(stagehand_lib::consts::DEFAULT_ROOT),
  };
  (manifest, path)
}
