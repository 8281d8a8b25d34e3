//! Host checks run once before any component.
//!
//! Failures here are fatal: the run stops before touching a component.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::execute::{ExecuteError, Invocation, Runner};
use crate::manifest::{HostRequirements, Prerequisites};

#[derive(Debug, Error)]
pub enum PreflightError {
  #[error("required environment variable '{0}' is not set")]
  MissingEnv(String),

  #[error("required path '{0}' does not exist")]
  MissingPath(PathBuf),

  #[error("prerequisite command is empty")]
  EmptyCommand,

  #[error("installing prerequisites failed: {0}")]
  Prerequisites(#[source] ExecuteError),
}

/// Check `[host]` requirements against a snapshot of the environment.
///
/// The environment is passed in so callers decide where it comes from.
pub fn check_host(requirements: &HostRequirements, env: &BTreeMap<String, String>) -> Result<(), PreflightError> {
  for var in &requirements.env {
    match env.get(var) {
      Some(value) if !value.is_empty() => {}
      _ => {
        warn!(var = %var, "host environment check failed");
        return Err(PreflightError::MissingEnv(var.clone()));
      }
    }
  }

  for path in &requirements.paths {
    if !path.exists() {
      warn!(path = %path.display(), "host path check failed");
      return Err(PreflightError::MissingPath(path.clone()));
    }
  }

  Ok(())
}

/// Install prerequisite packages with the configured package manager.
///
/// Does nothing when no packages are listed.
pub async fn install_prerequisites<R: Runner>(
  prerequisites: &Prerequisites,
  runner: &R,
  log: &Path,
) -> Result<(), PreflightError> {
  if prerequisites.packages.is_empty() {
    return Ok(());
  }
  let (program, args) = prerequisites.command.split_first().ok_or(PreflightError::EmptyCommand)?;

  let invocation = Invocation::new(program)
    .args(args.iter().cloned())
    .args(prerequisites.packages.iter().cloned());

  info!(count = prerequisites.packages.len(), "installing prerequisites");
  runner.run(&invocation, log).await.map_err(PreflightError::Prerequisites)
}
