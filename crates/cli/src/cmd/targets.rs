//! Implementation of the `natpack targets` command.
//!
//! Lists the target table and the task graph registered from it. Nothing is
//! executed.

use std::process::ExitCode;

use anyhow::Result;
use serde_json::json;

use natpack_lib::task::{AggregateKind, TaskPhase};

use super::RunArgs;
use crate::output::{OutputFormat, print_json, print_stat, symbols};

const PHASES: [TaskPhase; 3] = [TaskPhase::Clean, TaskPhase::Build, TaskPhase::Collect];
const AGGREGATES: [AggregateKind; 2] = [AggregateKind::CleanAll, AggregateKind::BuildAll];

pub fn cmd_targets(args: &RunArgs, output: OutputFormat) -> Result<ExitCode> {
  let orchestrator = args.orchestrator()?;
  let selected = args.selected(orchestrator.targets())?;
  let graph = orchestrator.graph();

  if output.is_json() {
    let targets: Vec<_> = selected
      .iter()
      .map(|t| {
        json!({
          "label": t.label(),
          "triple": t.triple(),
          "os": t.os(),
          "arch": t.arch(),
          "extension": t.library_extension(),
        })
      })
      .collect();
    let tasks: Vec<_> = PHASES
      .iter()
      .flat_map(|&phase| graph.tasks_for(phase, &selected))
      .map(|task| json!({ "id": task.id.to_string(), "prerequisites": graph.prerequisites(&task.id) }))
      .collect();
    let aggregates: Vec<_> = AGGREGATES
      .iter()
      .map(|&kind| json!({ "id": kind, "prerequisites": graph.aggregate(kind).prerequisites }))
      .collect();
    print_json(&json!({ "targets": targets, "tasks": tasks, "aggregates": aggregates }))?;
    return Ok(ExitCode::SUCCESS);
  }

  println!("Targets:");
  for target in &selected {
    println!(
      "  {} {:<16} {:<28} .{}",
      symbols::INFO,
      target.label(),
      target.triple(),
      target.library_extension()
    );
  }

  println!();
  println!("Tasks:");
  for phase in PHASES {
    for task in graph.tasks_for(phase, &selected) {
      let prerequisites = graph.prerequisites(&task.id);
      if prerequisites.is_empty() {
        println!("  {}", task.id);
      } else {
        let names: Vec<String> = prerequisites.iter().map(ToString::to_string).collect();
        println!("  {} {} {}", task.id, symbols::ARROW, names.join(", "));
      }
    }
  }

  println!();
  for kind in AGGREGATES {
    print_stat(kind.as_str(), &format!("{} prerequisite(s)", graph.aggregate(kind).prerequisites.len()));
  }

  Ok(ExitCode::SUCCESS)
}
