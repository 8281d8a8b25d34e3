use std::path::Path;

use anyhow::{Context, Result};

use stagehand_lib::root::BuildRoot;

use super::resolve_root;
use crate::output::{print_info, print_success};

/// Delete the whole build root. Cleaning a missing root is not an error.
pub fn cmd_clean(config: &Path, root: Option<&Path>) -> Result<()> {
  let (_, root_path) = resolve_root(config, root);
  let build_root = BuildRoot::at(&root_path);

  let removed = build_root
    .destroy()
    .with_context(|| format!("Failed to remove build root '{}'", root_path.display()))?;

  if removed {
    print_success(&format!("Removed {}", root_path.display()));
  } else {
    print_info(&format!("Nothing to clean at {}", root_path.display()));
  }
  Ok(())
}
