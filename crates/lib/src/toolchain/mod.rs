//! Boundary to the external toolchain that compiles the native project.
//!
//! The orchestrator only ever talks to a [`Toolchain`]. The production
//! implementation spawns cargo ([`CargoToolchain`]); tests substitute a fake
//! that records invocations and lays down artifacts itself.

pub mod cargo;
mod process;
#[cfg(test)]
pub(crate) mod fake;

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::task::TaskPhase;

pub use cargo::CargoToolchain;

/// One request to the toolchain: run `phase` for `triple` inside `working_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub phase: TaskPhase,
  pub working_dir: PathBuf,
  pub triple: String,
  pub release: bool,
  pub env: BTreeMap<String, String>,
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainOutput {
  pub stdout: String,
  pub stderr: String,
}

#[derive(Debug, Error)]
pub enum ToolchainError {
  /// The toolchain process could not be started.
  #[error("failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The toolchain ran and reported failure.
  #[error("toolchain failed for {triple} with exit code {code:?}: {stderr}")]
  ToolchainInvocation {
    triple: String,
    code: Option<i32>,
    stderr: String,
  },

  /// The toolchain does not support the requested phase.
  #[error("toolchain has no {0} step")]
  UnsupportedPhase(TaskPhase),
}

/// An external process that cleans or builds the native project for one target.
#[async_trait]
pub trait Toolchain: Send + Sync {
  /// Run the invocation to completion.
  ///
  /// Dropping the returned future must terminate any process it started.
  async fn invoke(&self, invocation: &Invocation) -> Result<ToolchainOutput, ToolchainError>;
}
