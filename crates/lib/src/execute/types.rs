//! Types for task execution.
//!
//! This module defines the per-target failure taxonomy, per-task outcomes and
//! the phase report that enumerates every target's terminal status.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::target::TargetSpec;
use crate::task::{TaskPhase, TaskStatus};
use crate::toolchain::ToolchainError;

/// Why a single target's task failed.
#[derive(Debug, Error)]
pub enum TargetFailure {
  /// The toolchain could not be started or exited non-zero.
  #[error(transparent)]
  Toolchain(#[from] ToolchainError),

  /// The build reported success but left no shared library behind.
  #[error("no .{extension} library found in {} after a successful build", .dir.display())]
  ArtifactNotFound { dir: PathBuf, extension: &'static str },

  /// I/O error while reading or writing artifacts.
  #[error("filesystem error at {}: {source}", .path.display())]
  Filesystem {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The task was cancelled while running (fail-fast or interrupt).
  #[error("aborted before completion")]
  Aborted,

  /// The task panicked.
  #[error("task panicked: {0}")]
  Panicked(String),
}

impl TargetFailure {
  pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Filesystem {
      path: path.into(),
      source,
    }
  }
}

/// Terminal (or never-started) state of one target's task in a phase run.
#[derive(Debug, Serialize)]
pub struct TaskOutcome {
  pub target: TargetSpec,
  pub status: TaskStatus,

  #[serde(serialize_with = "serialize_error", skip_serializing_if = "Option::is_none")]
  pub error: Option<TargetFailure>,

  /// Shared libraries found after a successful build.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub artifacts: Vec<PathBuf>,

  #[serde(serialize_with = "serialize_duration_ms", skip_serializing_if = "Option::is_none")]
  pub duration: Option<Duration>,
}

impl TaskOutcome {
  /// Outcome of a task that was never started.
  pub fn pending(target: TargetSpec) -> Self {
    Self {
      target,
      status: TaskStatus::Pending,
      error: None,
      artifacts: Vec::new(),
      duration: None,
    }
  }

  pub fn succeeded(target: TargetSpec, artifacts: Vec<PathBuf>, duration: Duration) -> Self {
    Self {
      target,
      status: TaskStatus::Succeeded,
      error: None,
      artifacts,
      duration: Some(duration),
    }
  }

  pub fn failed(target: TargetSpec, error: TargetFailure, duration: Option<Duration>) -> Self {
    Self {
      target,
      status: TaskStatus::Failed,
      error: Some(error),
      artifacts: Vec::new(),
      duration,
    }
  }
}

fn serialize_error<S: Serializer>(error: &Option<TargetFailure>, serializer: S) -> Result<S::Ok, S::Error> {
  match error {
    Some(e) => serializer.serialize_str(&e.to_string()),
    None => serializer.serialize_none(),
  }
}

fn serialize_duration_ms<S: Serializer>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
  match duration {
    Some(d) => serializer.serialize_u64(d.as_millis() as u64),
    None => serializer.serialize_none(),
  }
}

/// Result of running one phase over a set of targets.
///
/// `outcomes` holds one entry per selected target, in selection order.
/// `aggregate` is the status of the phase's aggregate task (`clean-all` /
/// `build-all`), which only reaches `Succeeded` when every registered target
/// of the phase succeeded in this run.
#[derive(Debug, Serialize)]
pub struct PhaseReport {
  pub phase: TaskPhase,
  pub aggregate: TaskStatus,
  pub outcomes: Vec<TaskOutcome>,
}

impl PhaseReport {
  /// Returns true if every selected target succeeded.
  pub fn is_success(&self) -> bool {
    self.outcomes.iter().all(|o| o.status == TaskStatus::Succeeded)
  }

  pub fn succeeded(&self) -> impl Iterator<Item = &TaskOutcome> {
    self.outcomes.iter().filter(|o| o.status == TaskStatus::Succeeded)
  }

  pub fn failed(&self) -> impl Iterator<Item = &TaskOutcome> {
    self.outcomes.iter().filter(|o| o.status == TaskStatus::Failed)
  }

  /// Targets that never started (fail-fast stopped scheduling).
  pub fn not_run(&self) -> impl Iterator<Item = &TaskOutcome> {
    self.outcomes.iter().filter(|o| o.status == TaskStatus::Pending)
  }

  /// Targets that succeeded, in selection order.
  pub fn succeeded_targets(&self) -> Vec<TargetSpec> {
    self.succeeded().map(|o| o.target.clone()).collect()
  }

  /// Labels of every target that did not succeed.
  pub fn unsuccessful_labels(&self) -> Vec<&str> {
    self
      .outcomes
      .iter()
      .filter(|o| o.status != TaskStatus::Succeeded)
      .map(|o| o.target.label())
      .collect()
  }

  pub fn outcome(&self, label: &str) -> Option<&TaskOutcome> {
    self.outcomes.iter().find(|o| o.target.label() == label)
  }
}

/// A phase run in which at least one target did not succeed.
///
/// Carries the complete report, so callers can tell exactly which targets
/// failed and still use the ones that succeeded.
#[derive(Debug)]
pub struct PhaseFailure {
  pub report: PhaseReport,
}

impl fmt::Display for PhaseFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let labels = self.report.unsuccessful_labels();
    write!(
      f,
      "{} failed for {} target(s): {}",
      self.report.phase,
      labels.len(),
      labels.join(", ")
    )
  }
}

impl std::error::Error for PhaseFailure {}

/// Failure of a build phase run.
pub type BuildFailure = PhaseFailure;

/// Failure of a clean phase run.
pub type CleanFailure = PhaseFailure;

impl PhaseReport {
  /// Convert into `Ok(self)` when every target succeeded.
  pub fn into_result(self) -> Result<PhaseReport, PhaseFailure> {
    if self.is_success() {
      Ok(self)
    } else {
      Err(PhaseFailure { report: self })
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn target(label: &str) -> TargetSpec {
    TargetSpec::new(label, "x86_64-unknown-linux-gnu").unwrap()
  }

  fn report(outcomes: Vec<TaskOutcome>) -> PhaseReport {
    PhaseReport {
      phase: TaskPhase::Build,
      aggregate: TaskStatus::Pending,
      outcomes,
    }
  }

  #[test]
  fn empty_report_is_success() {
    assert!(report(vec![]).is_success());
  }

  #[test]
  fn pending_outcome_is_not_success() {
    let r = report(vec![
      TaskOutcome::succeeded(target("a"), vec![], Duration::from_millis(5)),
      TaskOutcome::pending(target("b")),
    ]);
    assert!(!r.is_success());
    assert_eq!(r.not_run().count(), 1);
    assert_eq!(r.unsuccessful_labels(), vec!["b"]);
  }

  #[test]
  fn failure_message_names_targets() {
    let r = report(vec![
      TaskOutcome::succeeded(target("a"), vec![], Duration::ZERO),
      TaskOutcome::failed(target("b"), TargetFailure::Aborted, None),
      TaskOutcome::failed(
        target("c"),
        TargetFailure::ArtifactNotFound {
          dir: PathBuf::from("/x"),
          extension: "so",
        },
        None,
      ),
    ]);

    let failure = r.into_result().unwrap_err();
    assert_eq!(failure.to_string(), "build failed for 2 target(s): b, c");
    assert_eq!(failure.report.succeeded_targets(), vec![target("a")]);
  }

  #[test]
  fn outcome_serializes_error_as_string() {
    let outcome = TaskOutcome::failed(target("a"), TargetFailure::Aborted, Some(Duration::from_millis(12)));
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["status"], "failed");
    assert_eq!(json["error"], "aborted before completion");
    assert_eq!(json["duration"], 12);
    assert_eq!(json["target"]["label"], "a");
    assert!(json.get("artifacts").is_none());
  }
}
