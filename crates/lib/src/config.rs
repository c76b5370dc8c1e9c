//! Orchestrator configuration.
//!
//! Defaults are overlaid with `NATPACK_*` environment variables by
//! [`OrchestratorConfig::from_env`]; the CLI applies its flags on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::consts::{
  DEFAULT_PROGRAM, ENV_FAIL_FAST, ENV_JOBS, ENV_NATIVE_ROOT, ENV_PROGRAM, STRIP_METADATA_RUSTFLAGS,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("{var} must be a positive integer, got {value:?}")]
  InvalidJobs { var: &'static str, value: String },

  #[error("{var} must be a boolean (1/0, true/false, yes/no), got {value:?}")]
  InvalidBool { var: &'static str, value: String },

  #[error("parallelism must be at least 1")]
  ZeroParallelism,
}

/// Configuration for running toolchain tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
  /// Root of the external native project (the directory holding its `Cargo.toml`).
  pub native_root: PathBuf,

  /// Maximum number of toolchain processes running at once.
  pub parallelism: usize,

  /// Stop scheduling new tasks after the first failure.
  pub fail_fast: bool,

  /// Build with the release profile.
  pub release: bool,

  /// Minimise metadata in emitted binaries (see [`STRIP_METADATA_RUSTFLAGS`]).
  pub strip_metadata: bool,

  /// Toolchain program to invoke.
  pub program: String,

  /// Additional environment passed to every toolchain invocation.
  pub extra_env: BTreeMap<String, String>,
}

impl Default for OrchestratorConfig {
  fn default() -> Self {
    Self {
      native_root: PathBuf::from("."),
      parallelism: num_cpus(),
      fail_fast: false,
      release: true,
      strip_metadata: true,
      program: DEFAULT_PROGRAM.to_string(),
      extra_env: BTreeMap::new(),
    }
  }
}

impl OrchestratorConfig {
  /// Defaults overlaid with `NATPACK_NATIVE_ROOT`, `NATPACK_JOBS`,
  /// `NATPACK_CARGO` and `NATPACK_FAIL_FAST`.
  pub fn from_env() -> Result<Self, ConfigError> {
    let mut config = Self::default();

    if let Some(root) = read_var(ENV_NATIVE_ROOT) {
      config.native_root = PathBuf::from(root);
    }

    if let Some(jobs) = read_var(ENV_JOBS) {
      config.parallelism = match jobs.parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
          return Err(ConfigError::InvalidJobs {
            var: ENV_JOBS,
            value: jobs,
          });
        }
      };
    }

    if let Some(program) = read_var(ENV_PROGRAM) {
      config.program = program;
    }

    if let Some(value) = read_var(ENV_FAIL_FAST) {
      config.fail_fast = parse_bool(&value).ok_or(ConfigError::InvalidBool {
        var: ENV_FAIL_FAST,
        value,
      })?;
    }

    debug!(?config, "loaded configuration");
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.parallelism == 0 {
      return Err(ConfigError::ZeroParallelism);
    }
    Ok(())
  }

  /// Native project root, canonicalised when it exists.
  pub fn resolved_native_root(&self) -> PathBuf {
    dunce::canonicalize(&self.native_root).unwrap_or_else(|_| self.native_root.clone())
  }

  /// Environment for a toolchain invocation.
  ///
  /// User-supplied pairs win over the metadata flags, so an explicit
  /// `RUSTFLAGS` replaces the default one.
  pub fn toolchain_env(&self) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    if self.strip_metadata {
      env.insert("RUSTFLAGS".to_string(), STRIP_METADATA_RUSTFLAGS.to_string());
    }
    env.extend(self.extra_env.iter().map(|(k, v)| (k.clone(), v.clone())));
    env
  }
}

/// `<native_root>/target/<triple>/<profile>`, the layout cargo uses for
/// cross-compiled output.
pub fn artifact_dir(native_root: &Path, triple: &str, release: bool) -> PathBuf {
  let profile = if release { "release" } else { "debug" };
  native_root.join("target").join(triple).join(profile)
}

fn read_var(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
  match value.to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Some(true),
    "0" | "false" | "no" | "off" => Some(false),
    _ => None,
  }
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
