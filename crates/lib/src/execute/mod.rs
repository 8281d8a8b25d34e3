//! External tool execution.
//!
//! Every build tool, package tool and package manager is run through a
//! [`Runner`]. The orchestrator only observes the exit status; all output is
//! appended to the component's log file.

mod types;

use std::fs::OpenOptions;
use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

pub use types::{ExecuteError, Invocation};

/// Runs external commands on behalf of the orchestrator.
pub trait Runner {
  /// Run `invocation` to completion, appending its stdout and stderr to `log`.
  fn run(&self, invocation: &Invocation, log: &Path) -> impl Future<Output = Result<(), ExecuteError>>;
}

impl<R: Runner + ?Sized> Runner for &R {
  fn run(&self, invocation: &Invocation, log: &Path) -> impl Future<Output = Result<(), ExecuteError>> {
    (**self).run(invocation, log)
  }
}

/// Runs commands as real child processes.
///
/// Children inherit the parent environment plus the invocation's variables.
/// A child is killed if its future is dropped, so an interrupted run never
/// leaves a build tool running in the background.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
  pub fn new() -> Self {
    Self
  }
}

impl Runner for ProcessRunner {
  async fn run(&self, invocation: &Invocation, log: &Path) -> Result<(), ExecuteError> {
    info!(cmd = %invocation, "executing command");

    let open_log = || {
      OpenOptions::new()
        .create(true)
        .append(true)
        .open(log)
        .map_err(|source| ExecuteError::Log {
          path: log.to_path_buf(),
          source,
        })
    };

    let mut header = open_log()?;
    writeln!(header, "$ {invocation}")?;
    drop(header);

    let stdout = open_log()?;
    let stderr = stdout.try_clone()?;

    let mut command = Command::new(&invocation.program);
    command
      .args(&invocation.args)
      .envs(&invocation.env)
      .stdin(Stdio::null())
      .stdout(Stdio::from(stdout))
      .stderr(Stdio::from(stderr))
      .kill_on_drop(true);

    if let Some(cwd) = &invocation.cwd {
      command.current_dir(cwd);
    }

    debug!(program = %invocation.program, cwd = ?invocation.cwd, "spawning process");

    let status = command
      .spawn()
      .map_err(|source| ExecuteError::Spawn {
        program: invocation.program.clone(),
        source,
      })?
      .wait()
      .await?;

    if !status.success() {
      return Err(ExecuteError::CmdFailed {
        cmd: invocation.to_string(),
        code: status.code(),
      });
    }

    Ok(())
  }
}
