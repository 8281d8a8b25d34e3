mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{BuildArgs, cmd_build, cmd_clean, cmd_status};

/// stagehand - resumable source builds for a shared install prefix
#[derive(Parser)]
#[command(name = stagehand_lib::consts::APP_NAME)]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Path to the component manifest
  #[arg(short, long, global = true, default_value = stagehand_lib::consts::MANIFEST_FILENAME)]
  config: PathBuf,

  /// Build root, overriding `[build] root` from the manifest
  #[arg(long, global = true, env = "STAGEHAND_ROOT")]
  root: Option<PathBuf>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every component that is not yet complete (the default)
  Build {
    /// Skip producing package archives
    #[arg(long)]
    no_package: bool,

    /// Order components by their declared dependencies and skip dependents of
    /// components that are not built
    #[arg(long)]
    enforce_deps: bool,
  },

  /// List completed (and pending) components
  Status {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Delete the build root, forcing a full rebuild next time
  Clean,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "error" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let root = cli.root.as_deref();
  match cli.command.unwrap_or(Commands::Build {
    no_package: false,
    enforce_deps: false,
  }) {
    Commands::Build {
      no_package,
      enforce_deps,
    } => cmd_build(
      &cli.config,
      root,
      BuildArgs {
        no_package,
        enforce_deps,
      },
    ),
    Commands::Status { json } => cmd_status(&cli.config, root, json),
    Commands::Clean => cmd_clean(&cli.config, root),
  }
}
