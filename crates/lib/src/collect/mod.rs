//! Artifact collection.
//!
//! Copies each target's shared libraries from the toolchain output directory
//! into one package tree:
//!
//! ```text
//! <output_root>/native/<platform label>/<library file>
//! <output_root>/native/index.json
//! ```
//!
//! Libraries for different targets usually share a base name (`libengine.so`
//! for two Linux architectures), so every target gets its own directory named
//! after its platform label. Destinations for all targets are planned up front
//! and checked for duplicates before any file is written.

pub mod index;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::artifact_dir;
use crate::consts::NATIVE_DIR;
use crate::execute::types::TargetFailure;
use crate::target::TargetSpec;
use crate::util::hash::{hash_file, same_contents};

pub use index::{IndexEntry, IndexLibrary, PackageIndex};

/// A collected shared library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactLocation {
  pub label: String,
  pub triple: String,
  pub source: PathBuf,
  pub destination: PathBuf,
  pub sha256: String,
  /// False when the destination already held identical content.
  pub copied: bool,
}

/// A target that could not be collected.
#[derive(Debug, Error)]
#[error("{}: {error}", .target.label())]
pub struct TargetCollectError {
  pub target: TargetSpec,
  #[source]
  pub error: TargetFailure,
}

#[derive(Debug, Error)]
pub enum CollectFailure {
  /// Two artifacts were planned for the same destination. Nothing was written.
  #[error("artifacts of {first} and {second} would both be written to {}", .destination.display())]
  Collision {
    destination: PathBuf,
    first: String,
    second: String,
  },

  /// Some targets failed; the others were collected.
  #[error("collection failed for {} target(s): {}", .failures.len(), join_labels(.failures))]
  Targets {
    collected: Vec<ArtifactLocation>,
    failures: Vec<TargetCollectError>,
  },

  /// The package index could not be written after copying.
  #[error("failed to write package index {}: {source}", .path.display())]
  Index {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

fn join_labels(failures: &[TargetCollectError]) -> String {
  failures.iter().map(|f| f.target.label()).collect::<Vec<_>>().join(", ")
}

/// Directory receiving one target's libraries.
pub fn target_output_dir(output_root: &Path, target: &TargetSpec) -> PathBuf {
  output_root.join(NATIVE_DIR).join(target.label())
}

/// Shared libraries directly inside `dir` with the given extension, sorted by
/// file name.
///
/// Only the top level is scanned; cargo keeps intermediate objects in
/// subdirectories (`deps/`, `build/`).
pub fn scan_artifacts(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
  if !dir.is_dir() {
    return Ok(Vec::new());
  }

  let mut found = Vec::new();
  for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    if !entry.file_type().is_file() {
      continue;
    }
    let matches = entry
      .path()
      .extension()
      .and_then(|e| e.to_str())
      .is_some_and(|e| e.eq_ignore_ascii_case(extension));
    if matches {
      found.push(entry.into_path());
    }
  }
  Ok(found)
}

struct PlannedCopy<'a> {
  target: &'a TargetSpec,
  source: PathBuf,
  destination: PathBuf,
}

/// Find each target's artifacts and decide where they go.
fn plan<'a>(
  targets: &'a [TargetSpec],
  native_root: &Path,
  output_root: &Path,
  release: bool,
) -> (Vec<PlannedCopy<'a>>, Vec<TargetCollectError>) {
  let mut planned = Vec::new();
  let mut failures = Vec::new();

  for target in targets {
    let dir = artifact_dir(native_root, target.triple(), release);
    let extension = target.library_extension();

    let sources = match scan_artifacts(&dir, extension) {
      Ok(sources) => sources,
      Err(e) => {
        failures.push(TargetCollectError {
          target: target.clone(),
          error: TargetFailure::filesystem(&dir, e),
        });
        continue;
      }
    };

    if sources.is_empty() {
      warn!(target = %target.label(), dir = ?dir, "no artifacts to collect");
      failures.push(TargetCollectError {
        target: target.clone(),
        error: TargetFailure::ArtifactNotFound { dir, extension },
      });
      continue;
    }

    let out_dir = target_output_dir(output_root, target);
    for source in sources {
      let Some(file_name) = source.file_name() else {
        continue;
      };
      let destination = out_dir.join(file_name);
      planned.push(PlannedCopy {
        target,
        source,
        destination,
      });
    }
  }

  (planned, failures)
}

/// Reject plans where two artifacts share a destination.
///
/// Paths are compared case-insensitively so the layout stays collision-free
/// on case-insensitive filesystems.
fn check_collisions(planned: &[PlannedCopy<'_>]) -> Result<(), CollectFailure> {
  let mut seen: HashMap<String, &PlannedCopy<'_>> = HashMap::new();
  for copy in planned {
    let key = copy.destination.to_string_lossy().to_lowercase();
    if let Some(existing) = seen.insert(key, copy) {
      return Err(CollectFailure::Collision {
        destination: copy.destination.clone(),
        first: existing.target.label().to_string(),
        second: copy.target.label().to_string(),
      });
    }
  }
  Ok(())
}

/// Copy `source` to `destination` through a temporary file and rename, so a
/// reader never sees a partially written library.
fn copy_atomic(source: &Path, destination: &Path) -> Result<bool, TargetFailure> {
  if same_contents(source, destination).map_err(|e| TargetFailure::filesystem(source, e))? {
    debug!(destination = ?destination, "destination already up to date");
    return Ok(false);
  }

  let parent = destination.parent().unwrap_or_else(|| Path::new("."));
  fs::create_dir_all(parent).map_err(|e| TargetFailure::filesystem(parent, e))?;

  let mut input = fs::File::open(source).map_err(|e| TargetFailure::filesystem(source, e))?;
  let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| TargetFailure::filesystem(parent, e))?;
  io::copy(&mut input, temp.as_file_mut()).map_err(|e| TargetFailure::filesystem(temp.path(), e))?;
  temp
    .persist(destination)
    .map_err(|e| TargetFailure::filesystem(destination, e.error))?;

  Ok(true)
}

/// Copy every target's shared libraries into `output_root`.
///
/// Targets are independent: a target without artifacts, or with an I/O error,
/// is reported in [`CollectFailure::Targets`] while the remaining targets are
/// still collected and indexed. Running the collection again for unchanged
/// builds yields the same destinations and leaves their contents untouched.
pub fn collect_artifacts(
  targets: &[TargetSpec],
  native_root: &Path,
  output_root: &Path,
  release: bool,
) -> Result<Vec<ArtifactLocation>, CollectFailure> {
  info!(
    targets = targets.len(),
    output_root = ?output_root,
    "collecting artifacts"
  );

  let (planned, mut failures) = plan(targets, native_root, output_root, release);
  check_collisions(&planned)?;

  let mut collected = Vec::new();
  let mut failed_labels: Vec<&str> = Vec::new();

  for copy in &planned {
    if failed_labels.contains(&copy.target.label()) {
      continue;
    }

    let result = copy_atomic(&copy.source, &copy.destination).and_then(|copied| {
      let sha256 = hash_file(&copy.destination).map_err(|e| TargetFailure::filesystem(&copy.destination, e))?;
      Ok((copied, sha256))
    });

    match result {
      Ok((copied, sha256)) => {
        debug!(
          target = %copy.target.label(),
          destination = ?copy.destination,
          copied,
          "collected artifact"
        );
        collected.push(ArtifactLocation {
          label: copy.target.label().to_string(),
          triple: copy.target.triple().to_string(),
          source: copy.source.clone(),
          destination: copy.destination.clone(),
          sha256: sha256.0,
          copied,
        });
      }
      Err(error) => {
        warn!(target = %copy.target.label(), error = %error, "failed to collect artifact");
        failed_labels.push(copy.target.label());
        failures.push(TargetCollectError {
          target: copy.target.clone(),
          error,
        });
      }
    }
  }

  // A target that failed part-way keeps no entries in the result
  collected.retain(|loc| !failed_labels.contains(&loc.label.as_str()));

  if !collected.is_empty() {
    let collected_targets: Vec<&TargetSpec> = targets
      .iter()
      .filter(|t| collected.iter().any(|loc| loc.label == t.label()))
      .collect();
    index::update_index(output_root, &collected_targets, &collected)?;
  }

  info!(
    collected = collected.len(),
    failed = failures.len(),
    "artifact collection complete"
  );

  if failures.is_empty() {
    Ok(collected)
  } else {
    Err(CollectFailure::Targets { collected, failures })
  }
}
