mod build;
mod clean;
mod collect;
mod info;
mod package;
mod targets;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use collect::cmd_collect;
pub use info::cmd_info;
pub use package::cmd_package;
pub use targets::cmd_targets;

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;

use natpack_lib::OrchestratorConfig;
use natpack_lib::execute::{Orchestrator, PhaseReport};
use natpack_lib::target::{TargetSpec, TargetTable};
use natpack_lib::toolchain::CargoToolchain;

use crate::output::{format_duration, print_json, print_stat, print_status_line, print_warning};

/// Flags shared by every subcommand. Each one overrides its `NATPACK_*`
/// environment variable.
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
  /// Root of the cargo project that builds the native library
  #[arg(long, global = true, value_name = "DIR")]
  pub native_root: Option<PathBuf>,

  /// Maximum number of concurrent toolchain processes
  #[arg(short, long, global = true, value_name = "N")]
  pub jobs: Option<usize>,

  /// Abort remaining targets after the first failure
  #[arg(long, global = true)]
  pub fail_fast: bool,

  /// Toolchain program to invoke instead of cargo
  #[arg(long, global = true, value_name = "PROGRAM")]
  pub cargo: Option<String>,

  /// Do not set RUSTFLAGS to strip location and debug-format metadata
  #[arg(long, global = true)]
  pub no_strip_metadata: bool,

  /// Extra environment variable for the toolchain (repeatable)
  #[arg(long = "env", global = true, value_name = "KEY=VALUE", value_parser = parse_key_val)]
  pub env: Vec<(String, String)>,

  /// Restrict the run to this platform label (repeatable)
  #[arg(short, long = "target", global = true, value_name = "LABEL")]
  pub targets: Vec<String>,
}

impl RunArgs {
  /// Environment configuration with the command-line flags applied on top.
  pub fn config(&self) -> Result<OrchestratorConfig> {
    let mut config = OrchestratorConfig::from_env().context("Invalid environment configuration")?;
    if let Some(root) = &self.native_root {
      config.native_root = root.clone();
    }
    if let Some(jobs) = self.jobs {
      config.parallelism = jobs;
    }
    if self.fail_fast {
      config.fail_fast = true;
    }
    if let Some(program) = &self.cargo {
      config.program = program.clone();
    }
    if self.no_strip_metadata {
      config.strip_metadata = false;
    }
    config.extra_env.extend(self.env.iter().cloned());
    config.validate().context("Invalid configuration")?;
    Ok(config)
  }

  pub fn orchestrator(&self) -> Result<Orchestrator> {
    let config = self.config()?;
    let table = TargetTable::builtin().context("Invalid built-in target table")?;
    let toolchain = Arc::new(CargoToolchain::new(config.program.clone()));
    Orchestrator::new(&table, config, toolchain).context("Failed to create orchestrator")
  }

  /// The targets named with `--target`, or every target when none was given.
  pub fn selected(&self, table: &TargetTable) -> Result<Vec<TargetSpec>> {
    table.select(&self.targets).context("Invalid target selection")
  }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
  match s.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
    _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
  }
}

/// Run `future` to completion on a fresh runtime, giving up on Ctrl-C or
/// SIGTERM.
///
/// Dropping the future drops its task set, which aborts every task and kills
/// their child processes.
pub(crate) fn block_on_interruptible<F: Future>(future: F) -> Result<F::Output> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(async {
    tokio::select! {
      output = future => Ok(output),
      signal = shutdown_signal() => {
        let signal = signal?;
        print_warning(&format!("Received {}, stopping toolchain processes", signal));
        bail!("Interrupted by {}", signal)
      }
    }
  })
}

/// Resolve on Ctrl-C, or on SIGTERM where it exists, with the signal's name.
async fn shutdown_signal() -> Result<&'static str> {
  #[cfg(unix)]
  {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
      result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT").context("Failed to listen for Ctrl-C"),
      _ = terminate.recv() => Ok("SIGTERM"),
    }
  }
  #[cfg(not(unix))]
  {
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    Ok("Ctrl-C")
  }
}

/// Print one line per selected target and a summary.
pub(crate) fn print_phase_report(report: &PhaseReport) {
  for outcome in &report.outcomes {
    let detail = match (&outcome.error, outcome.duration) {
      (Some(error), _) => format!("({}): {}", outcome.target.triple(), error),
      (None, Some(duration)) => format!("({}) in {}", outcome.target.triple(), format_duration(duration)),
      (None, None) => format!("({}) not run", outcome.target.triple()),
    };
    print_status_line(outcome.status, outcome.target.label(), &detail);
  }

  println!();
  print_stat("Succeeded", &report.succeeded().count().to_string());
  print_stat("Failed", &report.failed().count().to_string());
  let not_run = report.not_run().count();
  if not_run > 0 {
    print_stat("Not run", &not_run.to_string());
  }
}

/// Print a phase report in the requested format and map it to an exit code.
pub(crate) fn finish_phase(report: &PhaseReport, json: bool) -> Result<ExitCode> {
  if json {
    print_json(report)?;
  } else {
    print_phase_report(report);
  }
  Ok(exit_code(report.is_success()))
}

pub(crate) fn exit_code(success: bool) -> ExitCode {
  if success { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
