use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde_json::json;

use natpack_lib::collect::PackageIndex;
use natpack_lib::platform::Platform;

use super::RunArgs;
use crate::output::{OutputFormat, print_info, print_json, print_stat, print_warning, symbols};

pub fn cmd_info(args: &RunArgs, out: Option<&Path>, output: OutputFormat) -> Result<ExitCode> {
  let orchestrator = args.orchestrator()?;
  let config = orchestrator.config();
  let platform = Platform::current();
  let host_target = orchestrator.targets().host_target();

  let index = match out {
    Some(out) => {
      let path = PackageIndex::path(out);
      let index = PackageIndex::load(out).with_context(|| format!("Failed to read {}", path.display()))?;
      Some((path, index))
    }
    None => None,
  };

  if output.is_json() {
    let package = index.as_ref().map(|(path, index)| {
      let host = index.as_ref().and_then(|i| i.entry_for_host());
      json!({
        "index": path,
        "exists": index.is_some(),
        "host": host.map(|(label, entry)| json!({ "label": label, "entry": entry })),
      })
    });
    print_json(&json!({
      "version": env!("CARGO_PKG_VERSION"),
      "platform": platform.map(|p| p.to_string()),
      "host_target": host_target,
      "native_root": config.resolved_native_root(),
      "program": config.program,
      "parallelism": config.parallelism,
      "fail_fast": config.fail_fast,
      "strip_metadata": config.strip_metadata,
      "package": package,
    }))?;
    return Ok(ExitCode::SUCCESS);
  }

  println!("natpack v{}", env!("CARGO_PKG_VERSION"));
  match platform {
    Some(platform) => print_stat("Platform", &platform.to_string()),
    None => print_warning("Could not detect platform."),
  }
  match host_target {
    Some(target) => print_stat("Host target", &target.to_string()),
    None => print_stat("Host target", "none"),
  }
  print_stat("Native root", &config.resolved_native_root().display().to_string());
  print_stat("Toolchain", &config.program);
  print_stat("Parallelism", &config.parallelism.to_string());

  if let Some((path, index)) = index {
    println!();
    print_stat("Package index", &path.display().to_string());
    match index.as_ref().and_then(|i| i.entry_for_host()) {
      Some((label, entry)) => {
        print_stat("Host library", &format!("{} ({})", label, entry.triple));
        for library in &entry.libraries {
          println!("  {} {}", symbols::ARROW, library.path);
        }
      }
      None if index.is_none() => print_warning("No package index found. Run `natpack collect` first."),
      None => print_info("The package has no library for this host."),
    }
  }

  Ok(ExitCode::SUCCESS)
}
