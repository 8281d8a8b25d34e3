//! Status command implementation.
//!
//! Lists the components with a completion marker in the build root and, when
//! the manifest can be read, the ones still waiting to be built.

use std::path::Path;

use anyhow::{Context, Result};

use stagehand_lib::root::BuildRoot;
use stagehand_lib::state::{CompletionStore, MarkerStore};

use super::resolve_root;
use crate::output::{print_info, print_json, print_stat, print_success, symbols};

pub fn cmd_status(config: &Path, root: Option<&Path>, json: bool) -> Result<()> {
  let (manifest, root_path) = resolve_root(config, root);
  let build_root = BuildRoot::at(&root_path);
  let store = MarkerStore::new(build_root.markers_dir());

  let completed = store.completed().context("Failed to read completion markers")?;
  let pending: Option<Vec<&str>> = manifest.as_ref().map(|m| {
    m.components
      .iter()
      .map(|c| c.name.as_str())
      .filter(|name| !completed.iter().any(|done| done == name))
      .collect()
  });

  if json {
    let items: Vec<_> = completed
      .iter()
      .map(|name| {
        let record = store.record(name);
        serde_json::json!({
          "name": name,
          "version": record.as_ref().map(|r| r.version.as_str()),
          "completed_at": record.as_ref().map(|r| r.completed_at_unix),
        })
      })
      .collect();
    let json_output = serde_json::json!({
      "root": build_root.path(),
      "completed": { "count": completed.len(), "items": items },
      "pending": pending,
    });
    return print_json(&json_output);
  }

  if !build_root.exists() {
    print_info(&format!(
      "No build root at {}. Run 'stagehand build' to start.",
      build_root.path().display()
    ));
    return Ok(());
  }

  print_success(&format!("Build root: {}", build_root.path().display()));
  print_stat("Completed", &completed.len().to_string());
  if let Some(pending) = &pending {
    print_stat("Pending", &pending.len().to_string());
  }

  if !completed.is_empty() {
    println!();
    println!("Completed:");
    for name in &completed {
      match store.record(name) {
        Some(record) => println!("  {} {} {}", symbols::SUCCESS, name, record.version),
        None => println!("  {} {}", symbols::SUCCESS, name),
      }
    }
  }

  if let Some(pending) = pending.filter(|p| !p.is_empty()) {
    println!();
    println!("Pending:");
    for name in pending {
      println!("  {} {}", symbols::INFO, name);
    }
  }

  Ok(())
}
