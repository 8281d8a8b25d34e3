//! The build loop.
//!
//! Components are processed one at a time, in list order (or dependency
//! order when enforcement is on). For each one:
//!
//! 1. skip if a completion marker exists
//! 2. fetch or reuse the source, extract it, apply patches
//! 3. run the strategy adapter into a fresh stage directory
//! 4. optionally merge the stage onto the live prefix
//! 5. package (best-effort), then write the completion marker
//!
//! A failing component is recorded with the tail of its log and the run moves
//! on. Only setup problems (duplicate names, dependency cycles) abort a run.

mod types;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::buildlog::BuildLog;
use crate::component::{ComponentSpec, Source};
use crate::dag::ComponentGraph;
use crate::execute::Runner;
use crate::extract::extract;
use crate::fetch::{self, git};
use crate::manifest::{FetchSettings, HostRequirements, Manifest, PackageSettings, Prerequisites, Settings};
use crate::package::{PackageMetadata, build_package};
use crate::preflight::{self, PreflightError};
use crate::root::{BuildRoot, fresh_dir};
use crate::state::CompletionStore;
use crate::strategy::{BuildContext, adapter_for, run_adapter};
use crate::util::fs::{copy_tree, is_empty_dir};

pub use types::{
  ComponentError, ComponentResult, CurrentStep, Event, Outcome, OrchestratorError, RunReport, SkipReason,
};

type Reporter = Box<dyn Fn(&Event)>;

pub struct Orchestrator<S, R> {
  root: BuildRoot,
  settings: Settings,
  fetch: FetchSettings,
  package: PackageSettings,
  store: S,
  runner: R,
  client: reqwest::Client,
  current: CurrentStep,
  reporter: Option<Reporter>,
}

impl<S: CompletionStore, R: Runner> Orchestrator<S, R> {
  /// Set up an orchestrator for `manifest` working in `root`.
  pub fn new(root: BuildRoot, manifest: &Manifest, store: S, runner: R) -> Result<Self, OrchestratorError> {
    let client = fetch::http_client(&manifest.fetch)?;
    Ok(Self {
      root,
      settings: manifest.settings.clone(),
      fetch: manifest.fetch.clone(),
      package: manifest.package.clone(),
      store,
      runner,
      client,
      current: CurrentStep::default(),
      reporter: None,
    })
  }

  /// Deliver [`Event`]s to `reporter` as the run progresses.
  pub fn with_reporter(mut self, reporter: impl Fn(&Event) + 'static) -> Self {
    self.reporter = Some(Box::new(reporter));
    self
  }

  pub fn with_packaging(mut self, enabled: bool) -> Self {
    self.package.enabled = enabled;
    self
  }

  pub fn with_enforced_dependencies(mut self, enforce: bool) -> Self {
    self.settings.enforce_dependencies = enforce;
    self
  }

  pub fn root(&self) -> &BuildRoot {
    &self.root
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub fn runner(&self) -> &R {
    &self.runner
  }

  /// Handle to the step in progress, for reporting on interrupt.
  pub fn current_step(&self) -> CurrentStep {
    self.current.clone()
  }

  /// Check host requirements and install prerequisites. Any failure is fatal.
  ///
  /// `env` is the environment snapshot the host requirements are checked against.
  pub async fn preflight(
    &self,
    host: &HostRequirements,
    prerequisites: Option<&Prerequisites>,
    env: &BTreeMap<String, String>,
  ) -> Result<(), PreflightError> {
    preflight::check_host(host, env)?;

    if let Some(prerequisites) = prerequisites {
      self.current.set("installing prerequisites");
      let log = self.root.logs_dir().join("prerequisites.log");
      let result = preflight::install_prerequisites(prerequisites, &self.runner, &log).await;
      self.current.clear();
      result?;
    }
    Ok(())
  }

  /// Process every component and report what happened to each.
  pub async fn run(&mut self, components: &[ComponentSpec]) -> Result<RunReport, OrchestratorError> {
    let mut seen = HashSet::new();
    for component in components {
      if !seen.insert(component.name.as_str()) {
        return Err(OrchestratorError::DuplicateName(component.name.clone()));
      }
    }

    let graph = if self.settings.enforce_dependencies {
      Some(ComponentGraph::new(components)?)
    } else {
      None
    };
    let order: Vec<usize> = match &graph {
      Some(graph) => graph.build_order(),
      None => (0..components.len()).collect(),
    };

    info!(
      components = components.len(),
      root = %self.root.path().display(),
      enforce_dependencies = graph.is_some(),
      "starting build"
    );

    let mut report = RunReport::default();
    for idx in order {
      let component = &components[idx];
      let outcome = self.process(component, graph.as_ref()).await;
      report.results.push(ComponentResult {
        name: component.name.clone(),
        log: self.root.log_path(&component.name),
        outcome,
      });
    }
    self.current.clear();

    report.completed = self.store.completed()?;
    info!(
      built = report.built(),
      skipped = report.skipped(),
      failed = report.failed(),
      completed = report.completed.len(),
      "build finished"
    );
    Ok(report)
  }

  async fn process(&mut self, component: &ComponentSpec, graph: Option<&ComponentGraph>) -> Outcome {
    let name = component.name.as_str();

    match self.store.is_complete(name) {
      Ok(true) => {
        info!("{name} already built, skipping");
        return self.skip(name, SkipReason::AlreadyBuilt);
      }
      Ok(false) => {}
      Err(e) => return self.fail(component, None, e.into()),
    }

    if let Some(graph) = graph {
      for dep in graph.dependencies(name) {
        match self.store.is_complete(&dep) {
          Ok(true) => {}
          Ok(false) => {
            warn!(component = name, dependency = %dep, "dependency not built, skipping");
            return self.skip(name, SkipReason::MissingDependency(dep));
          }
          Err(e) => return self.fail(component, None, e.into()),
        }
      }
    }

    self.emit(Event::Started {
      name: name.to_string(),
      version: component.version.clone(),
    });
    info!(component = name, version = %component.version, strategy = %component.strategy, "building component");

    let log = match BuildLog::create(self.root.log_path(name)) {
      Ok(log) => log,
      Err(e) => return self.fail(component, None, ComponentError::io("failed to create build log")(e)),
    };
    log.step(&format!("building {name} {} ({})", component.version, component.strategy));

    let stage = match self.build(component, &log).await {
      Ok(stage) => stage,
      Err(e) => return self.fail(component, Some(&log), e),
    };

    let (package, package_error) = if self.package.enabled {
      self.package(component, &stage, &log).await
    } else {
      (None, None)
    };

    if let Err(e) = self.store.mark_complete(name, &component.version) {
      return self.fail(component, Some(&log), e.into());
    }
    log.step("done");
    self.current.clear();

    info!(component = name, "component built");
    self.emit(Event::Built { name: name.to_string() });
    Outcome::Built { package, package_error }
  }

  /// Everything between "not yet built" and "installed": returns the stage directory.
  async fn build(&self, component: &ComponentSpec, log: &BuildLog) -> Result<PathBuf, ComponentError> {
    let name = component.name.as_str();

    self.current.set(format!("{name}: fetch"));
    let source_dir = self.retrieve(component, log).await?;

    for patch in &component.patches {
      let outcome = patch.apply(&source_dir)?;
      log.step(&format!("patch {}: {outcome:?}", patch.file.display()));
    }

    let stage = self.root.stage_path(name);
    fresh_dir(&stage).map_err(ComponentError::io("failed to prepare stage directory"))?;

    let ctx = BuildContext {
      settings: &self.settings,
      component,
      source_dir: &source_dir,
      stage_dir: &stage,
    };
    let current = &self.current;
    run_adapter(adapter_for(component.strategy), &ctx, &self.runner, log, |phase, _| {
      current.set(format!("{name}: {phase}"));
    })
    .await?;

    if is_empty_dir(&stage) {
      warn!(component = name, stage = %stage.display(), "install produced an empty stage directory");
      log.step("warning: stage directory is empty");
    }

    if component.merge_into_prefix {
      self.current.set(format!("{name}: merge"));
      let target = self.settings.sysroot.clone();
      log.step(&format!("installing stage into {}", target.display()));
      let copied = copy_tree(&stage, &target, |_| false).map_err(|source| ComponentError::Merge {
        path: target.clone(),
        source,
      })?;
      debug!(component = name, files = copied, "stage merged into prefix");
    }

    Ok(stage)
  }

  /// Produce the component's source tree under `src/`.
  async fn retrieve(&self, component: &ComponentSpec, log: &BuildLog) -> Result<PathBuf, ComponentError> {
    let name = component.name.as_str();
    match &component.source {
      Source::Tarball { url, sha256 } => {
        let filename = fetch::url_to_filename(url);
        let archive = self.root.cache_path(name, &component.version, &filename);
        fetch::fetch_archive(&self.client, &self.fetch, url, sha256.as_deref(), &archive, log).await?;

        self.current.set(format!("{name}: extract"));
        let source_dir = extract(
          &archive,
          name,
          &self.root.unpack_path(name),
          &self.root.src_dir(),
          &self.runner,
          log,
        )
        .await?;
        Ok(source_dir)
      }
      Source::Git { url, rev } => {
        let cache = self.root.git_cache_path(name, rev);
        git::ensure_checkout(&self.fetch, url, rev, &cache, log).await?;
        let source_dir = git::materialize(&cache, &self.root.src_dir(), name, rev)
          .map_err(ComponentError::io("failed to copy checkout"))?;
        Ok(source_dir)
      }
    }
  }

  async fn package(
    &self,
    component: &ComponentSpec,
    stage: &Path,
    log: &BuildLog,
  ) -> (Option<PathBuf>, Option<String>) {
    let name = component.name.as_str();
    self.current.set(format!("{name}: package"));

    let meta = PackageMetadata::for_component(component, &self.settings, &self.package, stage);
    let result = build_package(
      &meta,
      &self.package,
      stage,
      &self.root.package_work_path(name),
      &self.root.packages_dir(),
      &self.runner,
      log,
    )
    .await;

    match result {
      Ok(path) => {
        self.emit(Event::Packaged {
          name: name.to_string(),
          path: path.clone(),
        });
        (Some(path), None)
      }
      Err(e) => {
        warn!(component = name, error = %e, "packaging failed");
        log.step(&format!("packaging failed: {e}"));
        self.emit(Event::PackageFailed {
          name: name.to_string(),
          error: e.to_string(),
        });
        (None, Some(e.to_string()))
      }
    }
  }

  fn skip(&self, name: &str, reason: SkipReason) -> Outcome {
    self.emit(Event::Skipped {
      name: name.to_string(),
      reason: reason.clone(),
    });
    Outcome::Skipped(reason)
  }

  fn fail(&self, component: &ComponentSpec, log: Option<&BuildLog>, error: ComponentError) -> Outcome {
    let log_tail = log.map(|l| l.tail(self.settings.log_tail_lines)).unwrap_or_default();
    let log_path = self.root.log_path(&component.name);

    error!(
      component = %component.name,
      error = %error,
      log = %log_path.display(),
      "component failed"
    );
    if let Some(log) = log {
      log.step(&format!("failed: {error}"));
    }

    self.emit(Event::Failed {
      name: component.name.clone(),
      error: error.to_string(),
      log: log_path,
      log_tail: log_tail.clone(),
    });
    self.current.clear();
    Outcome::Failed { error, log_tail }
  }

  fn emit(&self, event: Event) {
    if let Some(reporter) = &self.reporter {
      reporter(&event);
    }
  }
}
