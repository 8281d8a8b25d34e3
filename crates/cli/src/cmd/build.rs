//! Implementation of the `stagehand build` command.
//!
//! Loads the manifest, checks the host, then hands every component to the
//! orchestrator. Component failures are reported but do not change the exit
//! status; only setup failures do.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};
use tracing::info;

use stagehand_lib::execute::ProcessRunner;
use stagehand_lib::orchestrator::{Event, Orchestrator, RunReport, SkipReason};
use stagehand_lib::root::BuildRoot;
use stagehand_lib::state::MarkerStore;

use super::load_manifest;
use crate::output::{format_duration, print_error, print_info, print_stat, print_success, print_warning};

/// Exit status after Ctrl-C, as a shell reports SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildArgs {
  pub no_package: bool,
  pub enforce_deps: bool,
}

pub fn cmd_build(config: &Path, root: Option<&Path>, args: BuildArgs) -> Result<()> {
  let manifest = load_manifest(config, root)?;
  let build_root = BuildRoot::create(&manifest.settings.root)
    .with_context(|| format!("Failed to create build root '{}'", manifest.settings.root.display()))?;
  let store = MarkerStore::new(build_root.markers_dir());

  let mut orchestrator = Orchestrator::new(build_root.clone(), &manifest, store, ProcessRunner::new())
    .context("Failed to set up the build")?
    .with_reporter(report_event)
    .with_packaging(manifest.package.enabled && !args.no_package);
  if args.enforce_deps {
    orchestrator = orchestrator.with_enforced_dependencies(true);
  }
  let step = orchestrator.current_step();

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

  let env: BTreeMap<String, String> = std::env::vars().collect();
  if manifest.prerequisites.is_some() {
    print_info("Installing prerequisites");
  }
  rt.block_on(orchestrator.preflight(&manifest.host, manifest.prerequisites.as_ref(), &env))
    .context("Host preflight failed")?;

  print_info(&format!(
    "Building {} components in {}",
    manifest.components.len(),
    build_root.path().display()
  ));

  let started = Instant::now();
  let outcome = rt.block_on(async {
    tokio::select! {
      report = orchestrator.run(&manifest.components) => Some(report),
      Ok(()) = tokio::signal::ctrl_c() => None,
    }
  });

  let Some(report) = outcome else {
    eprintln!();
    match step.get() {
      Some(step) => print_warning(&format!("Interrupted while {step}")),
      None => print_warning("Interrupted"),
    }
    print_info("Completed components are kept; rerun to continue where this run stopped.");
    std::process::exit(INTERRUPTED_EXIT_CODE);
  };

  let report = report.context("Build aborted")?;
  info!(built = report.built(), failed = report.failed(), "run finished");
  print_summary(&build_root, &report, started);
  Ok(())
}

fn report_event(event: &Event) {
  match event {
    Event::Started { name, version } => print_info(&format!("Building {name} {version}")),
    Event::Skipped {
      name,
      reason: SkipReason::AlreadyBuilt,
    } => print_info(&format!("{name} already built, skipping")),
    Event::Skipped { name, reason } => print_warning(&format!("Skipping {name}: {reason}")),
    Event::Built { name } => print_success(&format!("{name} built")),
    Event::Failed {
      name,
      error,
      log,
      log_tail,
    } => {
      print_error(&format!("{name} failed: {error}"));
      print_stat("Log", &log.display().to_string());
      for line in log_tail {
        eprintln!("    {}", line.if_supports_color(Stream::Stderr, |s| s.dimmed()));
      }
    }
    Event::Packaged { name, path } => print_stat(&format!("{name} package"), &path.display().to_string()),
    Event::PackageFailed { name, error } => print_warning(&format!("Packaging {name} failed: {error}")),
  }
}

fn print_summary(root: &BuildRoot, report: &RunReport, started: Instant) {
  println!();
  if report.failed() == 0 {
    print_success("Build finished");
  } else {
    print_warning("Build finished with failures");
  }
  print_stat("Built", &report.built().to_string());
  print_stat("Skipped", &report.skipped().to_string());
  print_stat("Failed", &report.failed().to_string());
  print_stat("Completed", &report.completed.len().to_string());
  print_stat("Elapsed", &format_duration(started.elapsed()));
  print_stat("Packages", &root.packages_dir().display().to_string());
  print_stat("Logs", &root.logs_dir().display().to_string());

  let failed = report.failed_names();
  if !failed.is_empty() {
    print_stat("Needs attention", &failed.join(", "));
  }

  println!();
  print_info("Reruns are incremental: completed components are skipped, so it is safe to run again.");
}
