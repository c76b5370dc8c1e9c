mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::RunArgs;
use output::OutputFormat;

/// natpack - build a cargo project's shared library for every target and package the results
#[derive(Parser)]
#[command(name = "natpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t)]
  output: OutputFormat,

  #[command(flatten)]
  run: RunArgs,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// List the target table and the task graph derived from it
  Targets,

  /// Build the shared library for every selected target
  Build,

  /// Remove each selected target's build output
  Clean,

  /// Copy already-built libraries into a package directory
  Collect {
    /// Package root receiving native/<label>/<library>
    #[arg(long)]
    out: PathBuf,
  },

  /// Build, then collect every target that built
  Package {
    /// Package root receiving native/<label>/<library>
    #[arg(long)]
    out: PathBuf,
  },

  /// Show the host platform and the target that matches it
  Info {
    /// Package root whose index to look up the host library in
    #[arg(long)]
    out: Option<PathBuf>,
  },
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Targets => cmd::cmd_targets(&cli.run, cli.output),
    Commands::Build => cmd::cmd_build(&cli.run, cli.output),
    Commands::Clean => cmd::cmd_clean(&cli.run, cli.output),
    Commands::Collect { out } => cmd::cmd_collect(&cli.run, &out, cli.output),
    Commands::Package { out } => cmd::cmd_package(&cli.run, &out, cli.output),
    Commands::Info { out } => cmd::cmd_info(&cli.run, out.as_deref(), cli.output),
  }
}
