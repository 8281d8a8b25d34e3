//! Outcomes, events and errors reported by the orchestrator.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::component::PatchError;
use crate::dag::DagError;
use crate::extract::ExtractError;
use crate::fetch::FetchError;
use crate::state::StateError;
use crate::strategy::BuildError;

/// Why one component failed. Never escapes the run; it is recorded in the report.
#[derive(Debug, Error)]
pub enum ComponentError {
  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error(transparent)]
  Extract(#[from] ExtractError),

  #[error(transparent)]
  Patch(#[from] PatchError),

  #[error(transparent)]
  Build(#[from] BuildError),

  #[error("failed to install stage into '{path}': {source}")]
  Merge {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  State(#[from] StateError),

  #[error("{context}: {source}")]
  Io {
    context: String,
    #[source]
    source: std::io::Error,
  },
}

impl ComponentError {
  pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
    let context = context.into();
    move |source| ComponentError::Io { context, source }
  }

  /// Exit status of the failed build step, if a build step failed.
  pub fn exit_code(&self) -> Option<i32> {
    match self {
      ComponentError::Build(e) => e.exit_code(),
      _ => None,
    }
  }
}

/// Errors that stop a run before any component is attempted.
#[derive(Debug, Error)]
pub enum OrchestratorError {
  #[error("component '{0}' appears more than once")]
  DuplicateName(String),

  #[error(transparent)]
  Dag(#[from] DagError),

  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error(transparent)]
  State(#[from] StateError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
  /// A completion marker already exists.
  AlreadyBuilt,
  /// An in-list dependency has not completed (dependency enforcement only).
  MissingDependency(String),
}

impl fmt::Display for SkipReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SkipReason::AlreadyBuilt => f.write_str("already built"),
      SkipReason::MissingDependency(dep) => write!(f, "dependency '{dep}' is not built"),
    }
  }
}

/// What happened to one component.
#[derive(Debug)]
pub enum Outcome {
  Built {
    /// The package archive, when packaging ran and succeeded.
    package: Option<PathBuf>,
    /// Why packaging failed, when it ran and failed.
    package_error: Option<String>,
  },
  Skipped(SkipReason),
  Failed {
    error: ComponentError,
    /// The last lines of the component's log.
    log_tail: Vec<String>,
  },
}

#[derive(Debug)]
pub struct ComponentResult {
  pub name: String,
  pub log: PathBuf,
  pub outcome: Outcome,
}

/// Results of one run, in the order components were processed.
#[derive(Debug, Default)]
pub struct RunReport {
  pub results: Vec<ComponentResult>,
  /// Names with a completion marker once the run finished.
  pub completed: Vec<String>,
}

impl RunReport {
  pub fn built(&self) -> usize {
    self.count(|o| matches!(o, Outcome::Built { .. }))
  }

  pub fn skipped(&self) -> usize {
    self.count(|o| matches!(o, Outcome::Skipped(_)))
  }

  pub fn failed(&self) -> usize {
    self.count(|o| matches!(o, Outcome::Failed { .. }))
  }

  pub fn failed_names(&self) -> Vec<&str> {
    self
      .results
      .iter()
      .filter(|r| matches!(r.outcome, Outcome::Failed { .. }))
      .map(|r| r.name.as_str())
      .collect()
  }

  pub fn result(&self, name: &str) -> Option<&ComponentResult> {
    self.results.iter().find(|r| r.name == name)
  }

  fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
    self.results.iter().filter(|r| pred(&r.outcome)).count()
  }
}

/// Progress notifications delivered to the reporter as the run proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  Started { name: String, version: String },
  Skipped { name: String, reason: SkipReason },
  Built { name: String },
  Failed {
    name: String,
    error: String,
    log: PathBuf,
    log_tail: Vec<String>,
  },
  Packaged { name: String, path: PathBuf },
  PackageFailed { name: String, error: String },
}

/// The step currently executing, shared with whoever needs to report it on interrupt.
#[derive(Debug, Clone, Default)]
pub struct CurrentStep(Arc<Mutex<Option<String>>>);

impl CurrentStep {
  pub fn set(&self, step: impl Into<String>) {
    if let Ok(mut guard) = self.0.lock() {
      *guard = Some(step.into());
    }
  }

  pub fn clear(&self) {
    if let Ok(mut guard) = self.0.lock() {
      *guard = None;
    }
  }

  pub fn get(&self) -> Option<String> {
    self.0.lock().ok().and_then(|guard| guard.clone())
  }
}
