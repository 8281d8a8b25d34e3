use super::{BuildAdapter, BuildContext};
use crate::execute::Invocation;

/// Autotools-style `./configure && make && make install DESTDIR=<stage>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigureAdapter;

impl BuildAdapter for ConfigureAdapter {
  fn configure(&self, ctx: &BuildContext<'_>) -> Vec<Invocation> {
    let mut steps = Vec::new();

    // Git checkouts usually ship autogen.sh without a generated configure.
    if !ctx.source_dir.join("configure").exists() && ctx.source_dir.join("autogen.sh").exists() {
      steps.push(ctx.command("./autogen.sh").env("NOCONFIGURE", "1"));
    }

    let mut configure = ctx.command("./configure").arg(format!("--prefix={}", ctx.prefix()));
    if let Some(host) = &ctx.settings.host {
      configure = configure.arg(format!("--host={host}"));
    }
    configure = configure
      .args(ctx.settings.configure_flags.iter().cloned())
      .args(ctx.component.flags.iter().cloned());
    steps.push(configure);

    steps
  }

  fn compile(&self, ctx: &BuildContext<'_>) -> Vec<Invocation> {
    vec![ctx.command("make").arg(format!("-j{}", ctx.jobs()))]
  }

  fn install(&self, ctx: &BuildContext<'_>) -> Vec<Invocation> {
    vec![ctx.command("make").arg("install").arg(format!("DESTDIR={}", ctx.stage()))]
  }
}
