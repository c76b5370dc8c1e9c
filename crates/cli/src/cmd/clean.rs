//! Implementation of the `natpack clean` command.

use std::process::ExitCode;

use anyhow::Result;

use super::{RunArgs, block_on_interruptible, finish_phase};
use crate::output::OutputFormat;

/// Clean the selected targets. Other targets' build output is left alone.
pub fn cmd_clean(args: &RunArgs, output: OutputFormat) -> Result<ExitCode> {
  let orchestrator = args.orchestrator()?;
  let selected = args.selected(orchestrator.targets())?;

  let report = match block_on_interruptible(orchestrator.run_clean(&selected))? {
    Ok(report) => report,
    Err(failure) => failure.report,
  };

  finish_phase(&report, output.is_json())
}
