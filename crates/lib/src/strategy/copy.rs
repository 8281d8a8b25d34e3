use super::{BuildAdapter, BuildContext};
use crate::execute::Invocation;
use crate::manifest::join_rooted;

/// Installs the source tree verbatim under `<prefix>/<install_dir>`.
///
/// Used for asset-only components such as font bundles.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyAdapter;

impl CopyAdapter {
  fn destination(ctx: &BuildContext<'_>) -> String {
    join_rooted(ctx.stage_dir, &ctx.settings.prefix)
      .join(ctx.component.install_dir())
      .display()
      .to_string()
  }
}

impl BuildAdapter for CopyAdapter {
  fn configure(&self, _ctx: &BuildContext<'_>) -> Vec<Invocation> {
    Vec::new()
  }

  fn compile(&self, _ctx: &BuildContext<'_>) -> Vec<Invocation> {
    Vec::new()
  }

  fn install(&self, ctx: &BuildContext<'_>) -> Vec<Invocation> {
    let dest = Self::destination(ctx);
    vec![
      ctx.command("mkdir").arg("-p").arg(dest.as_str()),
      ctx.command("cp").arg("-R").arg(".").arg(dest),
    ]
  }
}
