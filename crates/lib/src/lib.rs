//! natpack-lib: packaging a cargo project's shared library for many targets
//!
//! This crate provides the pieces of the packaging pipeline:
//! - `TargetTable`: the ordered set of platform labels and target triples
//! - `TaskGraph`: clean, build and collect tasks per target plus aggregates
//! - `Orchestrator`: runs a phase through the external toolchain
//! - `collect_artifacts`: copies every library into a collision-free layout

pub mod collect;
pub mod config;
pub mod consts;
pub mod execute;
pub mod graph;
pub mod platform;
pub mod target;
pub mod task;
pub mod toolchain;
pub mod util;

pub use collect::{ArtifactLocation, CollectFailure, collect_artifacts};
pub use config::OrchestratorConfig;
pub use execute::{Orchestrator, PackageReport};
pub use target::{TargetSpec, TargetTable};
