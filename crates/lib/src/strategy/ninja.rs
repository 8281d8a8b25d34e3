use super::{BuildAdapter, BuildContext};
use crate::execute::Invocation;

const BUILD_DIR: &str = "build";

/// CMake generating Ninja files; installs with `DESTDIR` in the environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct NinjaAdapter;

impl BuildAdapter for NinjaAdapter {
  fn configure(&self, ctx: &BuildContext<'_>) -> Vec<Invocation> {
    vec![
      ctx
        .command("cmake")
        .args(["-S", ".", "-B", BUILD_DIR, "-G", "Ninja"])
        .arg(format!("-DCMAKE_INSTALL_PREFIX={}", ctx.prefix()))
        .arg("-DCMAKE_BUILD_TYPE=Release")
        .args(ctx.component.flags.iter().cloned()),
    ]
  }

  fn compile(&self, ctx: &BuildContext<'_>) -> Vec<Invocation> {
    vec![
      ctx
        .command("ninja")
        .args(["-C", BUILD_DIR])
        .arg(format!("-j{}", ctx.jobs())),
    ]
  }

  fn install(&self, ctx: &BuildContext<'_>) -> Vec<Invocation> {
    vec![
      ctx
        .command("ninja")
        .args(["-C", BUILD_DIR, "install"])
        .env("DESTDIR", ctx.stage()),
    ]
  }
}
