//! Build-strategy adapters.
//!
//! An adapter turns a component into three ordered command lists: configure,
//! compile and install-to-stage. Running them is shared: steps execute in
//! order and the first failure aborts the component with its exit status.
//!
//! Every adapter installs below the stage directory using the same prefix the
//! shared install uses, so a stage tree can be copied onto the sysroot without
//! rewriting paths.

mod configure;
mod copy;
mod meson;
mod ninja;

use std::fmt;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::buildlog::BuildLog;
use crate::component::{BuildStrategy, ComponentSpec};
use crate::consts::SOURCE_DATE_EPOCH;
use crate::execute::{ExecuteError, Invocation, Runner};
use crate::manifest::Settings;

pub use configure::ConfigureAdapter;
pub use copy::CopyAdapter;
pub use meson::MesonAdapter;
pub use ninja::NinjaAdapter;

/// The three capabilities every adapter provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Configure,
  Compile,
  Install,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Phase::Configure => "configure",
      Phase::Compile => "compile",
      Phase::Install => "install",
    })
  }
}

#[derive(Debug, Error)]
#[error("{phase} step failed: {source}")]
pub struct BuildError {
  pub phase: Phase,
  #[source]
  pub source: ExecuteError,
}

impl BuildError {
  pub fn exit_code(&self) -> Option<i32> {
    self.source.exit_code()
  }
}

/// Everything an adapter needs to plan one component's build.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
  pub settings: &'a Settings,
  pub component: &'a ComponentSpec,
  pub source_dir: &'a Path,
  pub stage_dir: &'a Path,
}

impl BuildContext<'_> {
  /// An invocation of `program` in the source directory with the build environment applied.
  pub fn command(&self, program: &str) -> Invocation {
    let s = self.settings;
    Invocation::new(program)
      .cwd(self.source_dir)
      .env("CFLAGS", s.cflags.as_str())
      .env("CXXFLAGS", s.cxxflags.as_str())
      .env("LDFLAGS", s.ldflags.as_str())
      .env("PKG_CONFIG_PATH", s.pkg_config_path())
      .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH)
      .envs(&s.env)
  }

  pub fn prefix(&self) -> String {
    self.settings.prefix.display().to_string()
  }

  pub fn stage(&self) -> String {
    self.stage_dir.display().to_string()
  }

  pub fn jobs(&self) -> usize {
    self.settings.jobs()
  }
}

/// A build-system driver.
pub trait BuildAdapter {
  fn configure(&self, ctx: &BuildContext<'_>) -> Vec<Invocation>;

  fn compile(&self, ctx: &BuildContext<'_>) -> Vec<Invocation>;

  /// Install into `ctx.stage_dir`, never into the shared prefix.
  fn install(&self, ctx: &BuildContext<'_>) -> Vec<Invocation>;

  /// All steps in execution order.
  fn plan(&self, ctx: &BuildContext<'_>) -> Vec<(Phase, Invocation)> {
    let mut steps = Vec::new();
    for (phase, invocations) in [
      (Phase::Configure, self.configure(ctx)),
      (Phase::Compile, self.compile(ctx)),
      (Phase::Install, self.install(ctx)),
    ] {
      steps.extend(invocations.into_iter().map(|inv| (phase, inv)));
    }
    steps
  }
}

/// The adapter for a strategy tag.
pub fn adapter_for(strategy: BuildStrategy) -> &'static dyn BuildAdapter {
  match strategy {
    BuildStrategy::Configure => &ConfigureAdapter,
    BuildStrategy::Ninja => &NinjaAdapter,
    BuildStrategy::Meson => &MesonAdapter,
    BuildStrategy::Copy => &CopyAdapter,
  }
}

/// Run every step of `adapter`, stopping at the first failure.
///
/// `on_step` is told about each step before it starts.
pub async fn run_adapter<R: Runner>(
  adapter: &dyn BuildAdapter,
  ctx: &BuildContext<'_>,
  runner: &R,
  log: &BuildLog,
  mut on_step: impl FnMut(Phase, &Invocation),
) -> Result<(), BuildError> {
  for (phase, invocation) in adapter.plan(ctx) {
    info!(component = %ctx.component.name, %phase, cmd = %invocation, "build step");
    log.step(&format!("{phase}: {invocation}"));
    on_step(phase, &invocation);
    runner
      .run(&invocation, log.path())
      .await
      .map_err(|source| BuildError { phase, source })?;
  }
  Ok(())
}
