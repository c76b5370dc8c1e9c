//! Task graph for a target table.
//!
//! The graph holds one node per `(phase, target)` task plus the two aggregate
//! nodes. Edges point from a prerequisite to its dependent:
//!
//! - every Clean task -> CleanAll
//! - every Build task -> BuildAll
//! - a target's Build task -> the same target's Collect task

use std::collections::HashMap;
use std::fmt;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::target::{TargetSpec, TargetTable};
use crate::task::{AggregateKind, AggregateTask, BuildTask, StatusBoard, TaskId, TaskPhase, TaskStatus};

/// A node in the task graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphNode {
  Task(TaskId),
  Aggregate(AggregateKind),
}

impl fmt::Display for GraphNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GraphNode::Task(id) => write!(f, "{}", id),
      GraphNode::Aggregate(kind) => write!(f, "{}", kind),
    }
  }
}

/// The fully determined task graph of a run.
pub struct TaskGraph {
  graph: DiGraph<GraphNode, ()>,
  targets: TargetTable,
  tasks: HashMap<TaskId, BuildTask>,
  task_nodes: HashMap<TaskId, NodeIndex>,
  aggregate_nodes: HashMap<AggregateKind, NodeIndex>,
}

impl TaskGraph {
  /// Create the Clean, Build and Collect tasks of every target and wire up
  /// the aggregates.
  pub fn register_targets(targets: &TargetTable) -> Self {
    let mut graph = DiGraph::new();
    let mut tasks = HashMap::new();
    let mut task_nodes = HashMap::new();
    let mut aggregate_nodes = HashMap::new();

    for kind in [AggregateKind::CleanAll, AggregateKind::BuildAll] {
      aggregate_nodes.insert(kind, graph.add_node(GraphNode::Aggregate(kind)));
    }

    for target in targets {
      let mut add_task = |phase: TaskPhase| {
        let task = BuildTask::new(phase, target.clone());
        let idx = graph.add_node(GraphNode::Task(task.id.clone()));
        task_nodes.insert(task.id.clone(), idx);
        tasks.insert(task.id.clone(), task);
        idx
      };

      let clean = add_task(TaskPhase::Clean);
      let build = add_task(TaskPhase::Build);
      let collect = add_task(TaskPhase::Collect);

      graph.add_edge(clean, aggregate_nodes[&AggregateKind::CleanAll], ());
      graph.add_edge(build, aggregate_nodes[&AggregateKind::BuildAll], ());
      graph.add_edge(build, collect, ());
    }

    debug!(
      targets = targets.len(),
      nodes = graph.node_count(),
      edges = graph.edge_count(),
      "registered task graph"
    );

    Self {
      graph,
      targets: targets.clone(),
      tasks,
      task_nodes,
      aggregate_nodes,
    }
  }

  pub fn targets(&self) -> &TargetTable {
    &self.targets
  }

  /// Look up a per-target task.
  pub fn task(&self, id: &TaskId) -> Option<&BuildTask> {
    self.tasks.get(id)
  }

  /// All tasks of one phase, in target table order.
  pub fn tasks(&self, phase: TaskPhase) -> Vec<&BuildTask> {
    self
      .targets
      .iter()
      .filter_map(|t| self.tasks.get(&TaskId::new(phase, t.label())))
      .collect()
  }

  /// Tasks of one phase restricted to the given targets, in the order given.
  pub fn tasks_for(&self, phase: TaskPhase, targets: &[TargetSpec]) -> Vec<&BuildTask> {
    targets
      .iter()
      .filter_map(|t| self.tasks.get(&TaskId::new(phase, t.label())))
      .collect()
  }

  /// The aggregate task of the given kind, with its prerequisites read from
  /// the graph.
  pub fn aggregate(&self, kind: AggregateKind) -> AggregateTask {
    let prerequisites = self
      .aggregate_nodes
      .get(&kind)
      .map(|&idx| self.incoming_tasks(idx))
      .unwrap_or_default();
    AggregateTask::new(kind, prerequisites)
  }

  /// Direct prerequisites of a per-target task.
  pub fn prerequisites(&self, id: &TaskId) -> Vec<TaskId> {
    self
      .task_nodes
      .get(id)
      .map(|&idx| self.incoming_tasks(idx))
      .unwrap_or_default()
  }

  fn incoming_tasks(&self, idx: NodeIndex) -> Vec<TaskId> {
    let mut ids: Vec<TaskId> = self
      .graph
      .neighbors_directed(idx, Direction::Incoming)
      .filter_map(|dep| match &self.graph[dep] {
        GraphNode::Task(id) => Some(id.clone()),
        GraphNode::Aggregate(_) => None,
      })
      .collect();
    ids.sort();
    ids
  }

  /// Status of an aggregate, derived from the board.
  pub fn aggregate_status(&self, kind: AggregateKind, board: &StatusBoard) -> TaskStatus {
    self.aggregate(kind).status(board)
  }

  /// Number of per-target tasks in one phase.
  pub fn task_count(&self, phase: TaskPhase) -> usize {
    self.tasks.keys().filter(|id| id.phase == phase).count()
  }

  pub fn aggregate_count(&self) -> usize {
    self.aggregate_nodes.len()
  }

  pub fn node_count(&self) -> usize {
    self.graph.node_count()
  }

  #[cfg(test)]
  fn inner(&self) -> &DiGraph<GraphNode, ()> {
    &self.graph
  }
}
