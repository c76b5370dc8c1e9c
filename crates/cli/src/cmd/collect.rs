//! Implementation of the `natpack collect` command.
//!
//! Copies libraries that are already built into the package layout without
//! invoking the toolchain.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use serde_json::json;

use natpack_lib::collect::{ArtifactLocation, CollectFailure};

use super::{RunArgs, exit_code};
use crate::output::{
  OutputFormat, print_error, print_info, print_json, print_stat, print_success, symbols, truncate_hash,
};

pub fn cmd_collect(args: &RunArgs, out: &Path, output: OutputFormat) -> Result<ExitCode> {
  let orchestrator = args.orchestrator()?;
  let selected = args.selected(orchestrator.targets())?;

  let result = orchestrator.collect_artifacts(&selected, out);
  print_collect_result(&result, out, output.is_json())?;
  Ok(exit_code(result.is_ok()))
}

/// Print a collection result. Shared with `natpack package`.
pub(crate) fn print_collect_result(
  result: &Result<Vec<ArtifactLocation>, CollectFailure>,
  out: &Path,
  json: bool,
) -> Result<()> {
  let (collected, error): (&[ArtifactLocation], Option<&CollectFailure>) = match result {
    Ok(locations) => (locations, None),
    Err(failure) => {
      let collected: &[ArtifactLocation] = match failure {
        CollectFailure::Targets { collected, .. } => collected,
        _ => &[],
      };
      (collected, Some(failure))
    }
  };

  if json {
    let value = json!({
      "output": out,
      "artifacts": collected,
      "error": error.map(|e| e.to_string()),
    });
    return print_json(&value);
  }

  if collected.is_empty() && error.is_none() {
    print_info("No artifacts to collect");
  }

  for location in collected {
    let state = if location.copied { "copied" } else { "unchanged" };
    println!(
      "  {} {} {} {} ({}, {})",
      symbols::INFO,
      location.label,
      symbols::ARROW,
      location.destination.display(),
      truncate_hash(&location.sha256),
      state
    );
  }

  match error {
    Some(failure) => {
      print_error(&format!("Collect failed: {}", failure));
      if let CollectFailure::Targets { failures, .. } = failure {
        for failure in failures {
          print_stat(failure.target.label(), &failure.error.to_string());
        }
      }
    }
    None if !collected.is_empty() => {
      print_success(&format!("Collected {} artifact(s) into {}", collected.len(), out.display()));
    }
    None => {}
  }

  Ok(())
}
