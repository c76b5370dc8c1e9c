//! Implementation of the `natpack build` command.
//!
//! Runs the toolchain build for every selected target and reports each
//! target's terminal status.

use std::process::ExitCode;

use anyhow::Result;

use super::{RunArgs, block_on_interruptible, finish_phase};
use crate::output::OutputFormat;

pub fn cmd_build(args: &RunArgs, output: OutputFormat) -> Result<ExitCode> {
  let orchestrator = args.orchestrator()?;
  let selected = args.selected(orchestrator.targets())?;

  let report = match block_on_interruptible(orchestrator.run_build(&selected))? {
    Ok(report) => report,
    Err(failure) => failure.report,
  };

  finish_phase(&report, output.is_json())
}
