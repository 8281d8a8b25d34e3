use super::{BuildAdapter, BuildContext};
use crate::execute::Invocation;

const BUILD_DIR: &str = "build";

/// `meson setup`, `meson compile`, `meson install --destdir`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MesonAdapter;

impl BuildAdapter for MesonAdapter {
  fn configure(&self, ctx: &BuildContext<'_>) -> Vec<Invocation> {
    vec![
      ctx
        .command("meson")
        .args(["setup", BUILD_DIR])
        .arg(format!("--prefix={}", ctx.prefix()))
        .arg("--buildtype=release")
        .args(ctx.component.flags.iter().cloned()),
    ]
  }

  fn compile(&self, ctx: &BuildContext<'_>) -> Vec<Invocation> {
    vec![
      ctx
        .command("meson")
        .args(["compile", "-C", BUILD_DIR, "-j"])
        .arg(ctx.jobs().to_string()),
    ]
  }

  fn install(&self, ctx: &BuildContext<'_>) -> Vec<Invocation> {
    vec![
      ctx
        .command("meson")
        .args(["install", "-C", BUILD_DIR, "--destdir"])
        .arg(ctx.stage()),
    ]
  }
}
