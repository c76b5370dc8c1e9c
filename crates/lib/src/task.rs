//! Tasks and their lifecycle.
//!
//! Every target contributes one task per [`TaskPhase`]. Tasks move through
//! `Pending -> Running -> Succeeded | Failed` exactly once per run. Aggregate
//! tasks carry no work of their own; their status is derived from their
//! prerequisites every time it is asked for.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::target::TargetSpec;

/// The phase a per-target task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPhase {
  Clean,
  Build,
  Collect,
}

impl TaskPhase {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Clean => "clean",
      Self::Build => "build",
      Self::Collect => "collect",
    }
  }
}

impl fmt::Display for TaskPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Identifies a per-target task: its phase plus the target's platform label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId {
  pub phase: TaskPhase,
  pub label: String,
}

impl TaskId {
  pub fn new(phase: TaskPhase, label: impl Into<String>) -> Self {
    Self {
      phase,
      label: label.into(),
    }
  }
}

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.phase, self.label)
  }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
  #[default]
  Pending,
  Running,
  Succeeded,
  Failed,
}

impl TaskStatus {
  /// Whether moving from `self` to `next` is a legal lifecycle step.
  pub fn can_transition_to(&self, next: TaskStatus) -> bool {
    matches!(
      (self, next),
      (Self::Pending, Self::Running) | (Self::Running, Self::Succeeded) | (Self::Running, Self::Failed)
    )
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Running => "running",
      Self::Succeeded => "succeeded",
      Self::Failed => "failed",
    }
  }
}

impl fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
  #[error("task {task} cannot move from {from} to {to}")]
  InvalidTransition {
    task: TaskId,
    from: TaskStatus,
    to: TaskStatus,
  },
}

/// A unit of work bound to one target and one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTask {
  pub id: TaskId,
  pub target: TargetSpec,
}

impl BuildTask {
  pub fn new(phase: TaskPhase, target: TargetSpec) -> Self {
    Self {
      id: TaskId::new(phase, target.label()),
      target,
    }
  }
}

/// The two aggregate tasks of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AggregateKind {
  #[serde(rename = "clean-all")]
  CleanAll,
  #[serde(rename = "build-all")]
  BuildAll,
}

impl AggregateKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::CleanAll => "clean-all",
      Self::BuildAll => "build-all",
    }
  }
}

impl fmt::Display for AggregateKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A join over prerequisite tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateTask {
  pub kind: AggregateKind,
  pub prerequisites: BTreeSet<TaskId>,
}

impl AggregateTask {
  pub fn new(kind: AggregateKind, prerequisites: impl IntoIterator<Item = TaskId>) -> Self {
    Self {
      kind,
      prerequisites: prerequisites.into_iter().collect(),
    }
  }

  /// Succeeded iff every prerequisite succeeded; Failed if any failed;
  /// otherwise Pending.
  pub fn status(&self, board: &StatusBoard) -> TaskStatus {
    aggregate_status(self.prerequisites.iter().map(|id| board.status(id)))
  }
}

/// Fold prerequisite statuses into an aggregate status.
pub fn aggregate_status(statuses: impl IntoIterator<Item = TaskStatus>) -> TaskStatus {
  let mut all_succeeded = true;
  for status in statuses {
    match status {
      TaskStatus::Failed => return TaskStatus::Failed,
      TaskStatus::Succeeded => {}
      TaskStatus::Pending | TaskStatus::Running => all_succeeded = false,
    }
  }

  if all_succeeded {
    TaskStatus::Succeeded
  } else {
    TaskStatus::Pending
  }
}

/// Current status of every task in a run.
///
/// Tasks that were never touched read as `Pending`.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
  statuses: HashMap<TaskId, TaskStatus>,
}

impl StatusBoard {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn status(&self, id: &TaskId) -> TaskStatus {
    self.statuses.get(id).copied().unwrap_or_default()
  }

  /// Apply a lifecycle transition, rejecting illegal ones.
  pub fn transition(&mut self, id: &TaskId, next: TaskStatus) -> Result<(), TaskError> {
    let current = self.status(id);
    if !current.can_transition_to(next) {
      return Err(TaskError::InvalidTransition {
        task: id.clone(),
        from: current,
        to: next,
      });
    }
    self.statuses.insert(id.clone(), next);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn id(label: &str) -> TaskId {
    TaskId::new(TaskPhase::Build, label)
  }

  #[test]
  fn task_id_display() {
    assert_eq!(TaskId::new(TaskPhase::Clean, "Linux-x86_64").to_string(), "clean:Linux-x86_64");
  }

  #[test]
  fn lifecycle_happy_path() {
    let mut board = StatusBoard::new();
    let task = id("a");

    assert_eq!(board.status(&task), TaskStatus::Pending);
    board.transition(&task, TaskStatus::Running).unwrap();
    board.transition(&task, TaskStatus::Succeeded).unwrap();
    assert_eq!(board.status(&task), TaskStatus::Succeeded);
  }

  #[test]
  fn terminal_states_are_final() {
    let mut board = StatusBoard::new();
    let task = id("a");
    board.transition(&task, TaskStatus::Running).unwrap();
    board.transition(&task, TaskStatus::Failed).unwrap();

    let err = board.transition(&task, TaskStatus::Running).unwrap_err();
    assert_eq!(
      err,
      TaskError::InvalidTransition {
        task: task.clone(),
        from: TaskStatus::Failed,
        to: TaskStatus::Running,
      }
    );
    assert!(board.transition(&task, TaskStatus::Succeeded).is_err());
  }

  #[test]
  fn cannot_succeed_without_running() {
    let mut board = StatusBoard::new();
    assert!(board.transition(&id("a"), TaskStatus::Succeeded).is_err());
  }

  #[test]
  fn aggregate_requires_unanimous_success() {
    let mut board = StatusBoard::new();
    let agg = AggregateTask::new(AggregateKind::BuildAll, [id("a"), id("b")]);
    assert_eq!(agg.status(&board), TaskStatus::Pending);

    board.transition(&id("a"), TaskStatus::Running).unwrap();
    board.transition(&id("a"), TaskStatus::Succeeded).unwrap();
    assert_eq!(agg.status(&board), TaskStatus::Pending);

    board.transition(&id("b"), TaskStatus::Running).unwrap();
    assert_eq!(agg.status(&board), TaskStatus::Pending);

    board.transition(&id("b"), TaskStatus::Succeeded).unwrap();
    assert_eq!(agg.status(&board), TaskStatus::Succeeded);
  }

  #[test]
  fn aggregate_fails_when_any_prerequisite_fails() {
    let mut board = StatusBoard::new();
    let agg = AggregateTask::new(AggregateKind::CleanAll, [id("a"), id("b")]);

    board.transition(&id("a"), TaskStatus::Running).unwrap();
    board.transition(&id("a"), TaskStatus::Failed).unwrap();
    assert_eq!(agg.status(&board), TaskStatus::Failed);
  }

  #[test]
  fn aggregate_without_prerequisites_succeeds() {
    let agg = AggregateTask::new(AggregateKind::BuildAll, Vec::<TaskId>::new());
    assert_eq!(agg.status(&StatusBoard::new()), TaskStatus::Succeeded);
  }
}
