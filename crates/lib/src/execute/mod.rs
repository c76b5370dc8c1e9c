//! Task execution.
//!
//! This module provides the entry points for running a phase over the task
//! graph. It handles:
//! - Bounded parallel execution of independent per-target tasks, started in
//!   table order
//! - Per-target failure reporting (siblings keep running)
//! - Optional fail-fast, which aborts in-flight tasks and their processes
//! - Packaging: build followed by collection of what built

pub mod types;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::collect::{self, ArtifactLocation, CollectFailure, scan_artifacts};
use crate::config::{ConfigError, OrchestratorConfig};
use crate::graph::TaskGraph;
use crate::target::{TargetSpec, TargetTable};
use crate::task::{AggregateKind, BuildTask, StatusBoard, TaskId, TaskPhase, TaskStatus};
use crate::toolchain::{Invocation, Toolchain};

pub use types::{BuildFailure, CleanFailure, PhaseFailure, PhaseReport, TargetFailure, TaskOutcome};

/// Outcome of [`Orchestrator::package`].
#[derive(Debug)]
pub struct PackageReport {
  pub build: PhaseReport,
  pub collect: Result<Vec<ArtifactLocation>, CollectFailure>,
}

impl PackageReport {
  pub fn is_success(&self) -> bool {
    self.build.is_success() && self.collect.is_ok()
  }
}

/// Drives the task graph of a target table through the external toolchain.
pub struct Orchestrator {
  graph: TaskGraph,
  config: OrchestratorConfig,
  toolchain: Arc<dyn Toolchain>,
}

type TaskResult = (TaskId, Result<Vec<std::path::PathBuf>, TargetFailure>, Duration);

impl Orchestrator {
  pub fn new(
    targets: &TargetTable,
    config: OrchestratorConfig,
    toolchain: Arc<dyn Toolchain>,
  ) -> Result<Self, ConfigError> {
    config.validate()?;
    Ok(Self {
      graph: TaskGraph::register_targets(targets),
      config,
      toolchain,
    })
  }

  pub fn graph(&self) -> &TaskGraph {
    &self.graph
  }

  pub fn config(&self) -> &OrchestratorConfig {
    &self.config
  }

  pub fn targets(&self) -> &TargetTable {
    self.graph.targets()
  }

  /// Build every registered target.
  pub async fn run_build_all(&self) -> Result<PhaseReport, BuildFailure> {
    self.run_build(self.graph.targets().as_slice()).await
  }

  /// Build the given targets.
  ///
  /// A target succeeds when the toolchain exits zero and its artifact
  /// directory holds at least one shared library of the target's family.
  /// Every successful outcome lists the libraries found.
  pub async fn run_build(&self, targets: &[TargetSpec]) -> Result<PhaseReport, BuildFailure> {
    self.run_phase(TaskPhase::Build, targets).await.into_result()
  }

  /// Clean every registered target.
  pub async fn run_clean_all(&self) -> Result<PhaseReport, CleanFailure> {
    self.run_clean(self.graph.targets().as_slice()).await
  }

  /// Clean the given targets. Each clean only touches its own triple's
  /// output directory.
  pub async fn run_clean(&self, targets: &[TargetSpec]) -> Result<PhaseReport, CleanFailure> {
    self.run_phase(TaskPhase::Clean, targets).await.into_result()
  }

  /// Copy the given targets' libraries into `output_root`.
  pub fn collect_artifacts(
    &self,
    targets: &[TargetSpec],
    output_root: &Path,
  ) -> Result<Vec<ArtifactLocation>, CollectFailure> {
    collect::collect_artifacts(
      targets,
      &self.config.resolved_native_root(),
      output_root,
      self.config.release,
    )
  }

  /// Build the given targets, then collect the ones that built.
  ///
  /// Targets that failed to build are left out of the collection, so a
  /// partial build still packages every library that exists.
  pub async fn package(&self, targets: &[TargetSpec], output_root: &Path) -> PackageReport {
    let build = self.run_phase(TaskPhase::Build, targets).await;
    let built = build.succeeded_targets();

    if !build.is_success() {
      warn!(
        built = built.len(),
        unsuccessful = ?build.unsuccessful_labels(),
        "collecting only the targets that built"
      );
    }

    let collect = self.collect_artifacts(&built, output_root);
    PackageReport { build, collect }
  }

  /// Run one phase over `targets` with bounded parallelism.
  async fn run_phase(&self, phase: TaskPhase, targets: &[TargetSpec]) -> PhaseReport {
    let tasks: Vec<BuildTask> = self.graph.tasks_for(phase, targets).into_iter().cloned().collect();

    info!(
      phase = %phase,
      tasks = tasks.len(),
      parallelism = self.config.parallelism,
      fail_fast = self.config.fail_fast,
      "starting phase"
    );

    let mut board = StatusBoard::new();
    let native_root = self.config.resolved_native_root();
    let env = self.config.toolchain_env();

    let mut join_set: JoinSet<TaskResult> = JoinSet::new();
    let mut tokio_ids = HashMap::new();
    let mut queue = tasks.iter();
    let mut finished: HashMap<TaskId, TaskOutcome> = HashMap::new();
    let mut aborting = false;

    loop {
      // Start tasks in table order while there is room; nothing new starts
      // once fail-fast has triggered
      while !aborting && join_set.len() < self.config.parallelism {
        let Some(task) = queue.next() else {
          break;
        };
        let id = task.id.clone();
        let target = task.target.clone();
        let toolchain = self.toolchain.clone();
        let invocation = Invocation {
          phase,
          working_dir: native_root.clone(),
          triple: target.triple().to_string(),
          release: self.config.release,
          env: env.clone(),
        };

        advance(&mut board, &id, TaskStatus::Running);
        debug!(task = %id, "task running");

        let handle = join_set.spawn(async move {
          let started = Instant::now();
          let result = run_task(toolchain.as_ref(), &invocation, &target).await;
          (id, result, started.elapsed())
        });
        tokio_ids.insert(handle.id(), task.id.clone());
      }

      let Some(joined) = join_set.join_next_with_id().await else {
        break;
      };

      let (id, result, elapsed) = match joined {
        Ok((_, (id, result, elapsed))) => (id, result, Some(elapsed)),
        Err(join_error) => {
          let Some(id) = tokio_ids.get(&join_error.id()).cloned() else {
            error!(error = %join_error, "lost track of a task");
            continue;
          };
          let failure = if join_error.is_cancelled() {
            TargetFailure::Aborted
          } else {
            TargetFailure::Panicked(join_error.to_string())
          };
          (id, Err(failure), None)
        }
      };

      let Some(task) = self.graph.task(&id) else {
        continue;
      };
      let target = task.target.clone();

      match result {
        Ok(artifacts) => {
          advance(&mut board, &id, TaskStatus::Succeeded);
          info!(target = %target.label(), phase = %phase, "task succeeded");
          finished.insert(
            id,
            TaskOutcome::succeeded(target, artifacts, elapsed.unwrap_or_default()),
          );
        }
        Err(failure) => {
          advance(&mut board, &id, TaskStatus::Failed);
          error!(target = %target.label(), phase = %phase, error = %failure, "task failed");
          finished.insert(id, TaskOutcome::failed(target, failure, elapsed));

          if self.config.fail_fast && !aborting {
            warn!(phase = %phase, "fail-fast: aborting remaining tasks");
            aborting = true;
            join_set.abort_all();
          }
        }
      }
    }

    let outcomes: Vec<TaskOutcome> = tasks
      .iter()
      .map(|task| {
        finished
          .remove(&task.id)
          .unwrap_or_else(|| TaskOutcome::pending(task.target.clone()))
      })
      .collect();

    let aggregate = match phase {
      TaskPhase::Clean => self.graph.aggregate_status(AggregateKind::CleanAll, &board),
      TaskPhase::Build => self.graph.aggregate_status(AggregateKind::BuildAll, &board),
      TaskPhase::Collect => crate::task::aggregate_status(outcomes.iter().map(|o| o.status)),
    };

    let report = PhaseReport {
      phase,
      aggregate,
      outcomes,
    };

    info!(
      phase = %phase,
      aggregate = %report.aggregate,
      succeeded = report.succeeded().count(),
      failed = report.failed().count(),
      not_run = report.not_run().count(),
      "phase complete"
    );

    report
  }
}

/// Record a status change, logging transitions the state machine rejects.
fn advance(board: &mut StatusBoard, id: &TaskId, next: TaskStatus) -> bool {
  match board.transition(id, next) {
    Ok(()) => true,
    Err(e) => {
      warn!(task = %id, error = %e, "illegal task transition");
      false
    }
  }
}

/// Invoke the toolchain for one task and, for builds, locate the artifacts.
async fn run_task(
  toolchain: &dyn Toolchain,
  invocation: &Invocation,
  target: &TargetSpec,
) -> Result<Vec<std::path::PathBuf>, TargetFailure> {
  toolchain.invoke(invocation).await?;

  if invocation.phase != TaskPhase::Build {
    return Ok(Vec::new());
  }

  let dir = crate::config::artifact_dir(&invocation.working_dir, &invocation.triple, invocation.release);
  let extension = target.library_extension();
  let artifacts = scan_artifacts(&dir, extension).map_err(|e| TargetFailure::filesystem(&dir, e))?;

  if artifacts.is_empty() {
    return Err(TargetFailure::ArtifactNotFound { dir, extension });
  }

  debug!(target = %target.label(), count = artifacts.len(), "found artifacts");
  Ok(artifacts)
}
