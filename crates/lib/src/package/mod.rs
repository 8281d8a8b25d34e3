//! Distributable packages built from stage trees.
//!
//! A package directory `work/pkg/<name>/` is assembled from a copy of the
//! stage plus a generated `DEBIAN/control`, then handed to the configured
//! package tool. Packaging is best-effort: callers report a [`PackageError`]
//! but never undo a completed build because of one.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::buildlog::BuildLog;
use crate::component::ComponentSpec;
use crate::execute::{ExecuteError, Invocation, Runner};
use crate::manifest::{PackageSettings, Settings};
use crate::root::fresh_dir;
use crate::util::fs::{copy_tree, dir_size};

#[derive(Debug, Error)]
pub enum PackageError {
  #[error("package tool is not configured")]
  NoTool,

  #[error("failed to assemble package directory '{path}': {source}")]
  Assemble {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("package tool failed: {0}")]
  Tool(#[from] ExecuteError),

  #[error("package tool reported success but '{0}' was not created")]
  Missing(PathBuf),
}

/// Metadata written into the package descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
  pub name: String,
  pub version: String,
  pub arch: String,
  pub section: String,
  pub priority: String,
  pub maintainer: String,
  pub installed_size_kib: u64,
  pub depends: Vec<String>,
  pub description: String,
}

impl PackageMetadata {
  pub fn for_component(
    component: &ComponentSpec,
    settings: &Settings,
    package: &PackageSettings,
    stage: &Path,
  ) -> Self {
    Self {
      name: component.name.clone(),
      version: component.version.clone(),
      arch: settings.arch.clone(),
      section: package.section.clone(),
      priority: package.priority.clone(),
      maintainer: package.maintainer.clone(),
      installed_size_kib: installed_size_kib(dir_size(stage)),
      depends: component.depends.clone(),
      description: component.description(),
    }
  }

  /// The control file contents, one `Key: value` per line.
  pub fn control(&self) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Package: {}", self.package_name());
    let _ = writeln!(out, "Version: {}", self.version);
    let _ = writeln!(out, "Section: {}", self.section);
    let _ = writeln!(out, "Priority: {}", self.priority);
    let _ = writeln!(out, "Architecture: {}", self.arch);
    let _ = writeln!(out, "Maintainer: {}", self.maintainer);
    let _ = writeln!(out, "Installed-Size: {}", self.installed_size_kib);
    if !self.depends.is_empty() {
      let depends: Vec<String> = self.depends.iter().map(|d| debian_name(d)).collect();
      let _ = writeln!(out, "Depends: {}", depends.join(", "));
    }
    let _ = writeln!(out, "Description: {}", self.description.lines().next().unwrap_or_default());
    out
  }

  /// The component name as it appears in the control file and archive name.
  pub fn package_name(&self) -> String {
    debian_name(&self.name)
  }

  /// `<package name>_<version>_<arch>.deb`
  pub fn file_name(&self) -> String {
    format!("{}_{}_{}.deb", self.package_name(), self.version, self.arch)
  }
}

/// Package names allow only lowercase letters, digits, `.`, `+` and `-`.
fn debian_name(name: &str) -> String {
  name
    .chars()
    .map(|c| if c == '_' { '-' } else { c.to_ascii_lowercase() })
    .collect()
}

/// Bytes to KiB, rounded up.
pub fn installed_size_kib(bytes: u64) -> u64 {
  bytes.div_ceil(1024)
}

/// Build a package for `meta` from `stage`, returning the archive path.
pub async fn build_package<R: Runner>(
  meta: &PackageMetadata,
  settings: &PackageSettings,
  stage: &Path,
  pkg_dir: &Path,
  out_dir: &Path,
  runner: &R,
  log: &BuildLog,
) -> Result<PathBuf, PackageError> {
  let (program, args) = settings.tool.split_first().ok_or(PackageError::NoTool)?;

  assemble(meta, stage, pkg_dir).map_err(|source| PackageError::Assemble {
    path: pkg_dir.to_path_buf(),
    source,
  })?;

  std::fs::create_dir_all(out_dir).map_err(|source| PackageError::Assemble {
    path: out_dir.to_path_buf(),
    source,
  })?;
  let output = out_dir.join(meta.file_name());

  let invocation = Invocation::new(program)
    .args(args.iter().cloned())
    .arg(pkg_dir.display().to_string())
    .arg(output.display().to_string());

  log.step(&format!("packaging {}", output.display()));
  runner.run(&invocation, log.path()).await?;

  if !output.is_file() {
    return Err(PackageError::Missing(output));
  }

  info!(package = %output.display(), "package created");
  Ok(output)
}

fn assemble(meta: &PackageMetadata, stage: &Path, pkg_dir: &Path) -> std::io::Result<()> {
  fresh_dir(pkg_dir)?;
  let copied = copy_tree(stage, pkg_dir, |_| false)?;
  let control_dir = pkg_dir.join("DEBIAN");
  std::fs::create_dir_all(&control_dir)?;
  std::fs::write(control_dir.join("control"), meta.control())?;
  debug!(dir = %pkg_dir.display(), files = copied, "package directory assembled");
  Ok(())
}
