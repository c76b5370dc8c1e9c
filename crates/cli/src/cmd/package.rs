//! Implementation of the `natpack package` command.
//!
//! Builds every selected target, then collects the libraries of the targets
//! that built. Exits non-zero if either step failed.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use serde_json::json;
use tracing::info;

use natpack_lib::collect::PackageIndex;

use super::collect::print_collect_result;
use super::{RunArgs, block_on_interruptible, exit_code, print_phase_report};
use crate::output::{OutputFormat, print_json};

pub fn cmd_package(args: &RunArgs, out: &Path, output: OutputFormat) -> Result<ExitCode> {
  let orchestrator = args.orchestrator()?;
  let selected = args.selected(orchestrator.targets())?;

  let report = block_on_interruptible(orchestrator.package(&selected, out))?;

  if output.is_json() {
    let (artifacts, error) = match &report.collect {
      Ok(locations) => (serde_json::to_value(locations)?, None),
      Err(failure) => (serde_json::Value::Null, Some(failure.to_string())),
    };
    print_json(&json!({
      "build": &report.build,
      "collect": { "artifacts": artifacts, "error": error },
      "success": report.is_success(),
    }))?;
  } else {
    println!("Build:");
    print_phase_report(&report.build);
    println!();
    println!("Collect:");
    print_collect_result(&report.collect, out, false)?;
  }

  if report.collect.as_ref().is_ok_and(|l| !l.is_empty()) {
    info!(path = %PackageIndex::path(out).display(), "package index written");
  }

  Ok(exit_code(report.is_success()))
}
