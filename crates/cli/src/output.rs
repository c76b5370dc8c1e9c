//! Terminal output for natpack.
//!
//! Text mode prints one status line per target and a summary. `--output json`
//! replaces all of it with a single pretty-printed document on stdout.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use natpack_lib::task::TaskStatus;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
  pub const PENDING: &str = "○";
}

pub fn truncate_hash(hash: &str) -> &str {
  let len = hash.len().min(12);
  &hash[..len]
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// Symbol shown in front of a target's label.
pub fn status_symbol(status: TaskStatus) -> &'static str {
  match status {
    TaskStatus::Succeeded => symbols::SUCCESS,
    TaskStatus::Failed => symbols::ERROR,
    TaskStatus::Pending | TaskStatus::Running => symbols::PENDING,
  }
}

/// One line per target: status symbol, label, then `detail`.
pub fn print_status_line(status: TaskStatus, label: &str, detail: &str) {
  let symbol = status_symbol(status);
  match status {
    TaskStatus::Failed => println!(
      "  {} {} {}",
      symbol.if_supports_color(Stream::Stdout, |s| s.red()),
      label.if_supports_color(Stream::Stdout, |s| s.red()),
      detail
    ),
    TaskStatus::Succeeded => println!(
      "  {} {} {}",
      symbol.if_supports_color(Stream::Stdout, |s| s.green()),
      label,
      detail.if_supports_color(Stream::Stdout, |s| s.dimmed())
    ),
    TaskStatus::Pending | TaskStatus::Running => println!(
      "  {} {} {}",
      symbol.if_supports_color(Stream::Stdout, |s| s.yellow()),
      label,
      detail.if_supports_color(Stream::Stdout, |s| s.dimmed())
    ),
  }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
