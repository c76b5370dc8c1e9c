//! Cargo as the external toolchain.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::process::{self, ProcessTree};
use super::{Invocation, Toolchain, ToolchainError, ToolchainOutput};
use crate::consts::DEFAULT_PROGRAM;
use crate::task::TaskPhase;

/// Runs `<program> build|clean [--release] --target <triple>` in the native
/// project root.
///
/// `program` is usually `cargo`, but any cargo-compatible front end
/// (`cross`, `cargo-zigbuild` wrappers) works.
#[derive(Debug, Clone)]
pub struct CargoToolchain {
  program: String,
}

impl CargoToolchain {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
    }
  }

  /// Command-line arguments for an invocation.
  pub fn args(invocation: &Invocation) -> Result<Vec<String>, ToolchainError> {
    let subcommand = match invocation.phase {
      TaskPhase::Build => "build",
      TaskPhase::Clean => "clean",
      TaskPhase::Collect => return Err(ToolchainError::UnsupportedPhase(TaskPhase::Collect)),
    };

    let mut args = vec![subcommand.to_string()];
    if invocation.release {
      args.push("--release".to_string());
    }
    args.push("--target".to_string());
    args.push(invocation.triple.clone());
    Ok(args)
  }
}

impl Default for CargoToolchain {
  fn default() -> Self {
    Self::new(DEFAULT_PROGRAM)
  }
}

#[async_trait]
impl Toolchain for CargoToolchain {
  async fn invoke(&self, invocation: &Invocation) -> Result<ToolchainOutput, ToolchainError> {
    let args = Self::args(invocation)?;

    info!(
      program = %self.program,
      phase = %invocation.phase,
      triple = %invocation.triple,
      "invoking toolchain"
    );

    let mut command = Command::new(&self.program);
    command
      .args(&args)
      .current_dir(&invocation.working_dir)
      .envs(&invocation.env)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    process::isolate(&mut command);

    debug!(args = ?args, working_dir = ?invocation.working_dir, "spawning process");

    let spawn_error = |source: std::io::Error| ToolchainError::Spawn {
      program: self.program.clone(),
      source,
    };
    let child = command.spawn().map_err(spawn_error)?;

    // Kills rustc, build scripts and linkers too if this future is dropped
    let tree = ProcessTree::attach(&child);
    let output = child.wait_with_output().await.map_err(spawn_error)?;
    tree.release();

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !stdout.is_empty() {
      debug!(triple = %invocation.triple, stdout = %stdout, "toolchain stdout");
    }
    if !stderr.is_empty() {
      debug!(triple = %invocation.triple, stderr = %stderr, "toolchain stderr");
    }

    if !output.status.success() {
      return Err(ToolchainError::ToolchainInvocation {
        triple: invocation.triple.clone(),
        code: output.status.code(),
        stderr,
      });
    }

    Ok(ToolchainOutput { stdout, stderr })
  }
}
