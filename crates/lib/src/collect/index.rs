//! Package index describing the collected native libraries.
//!
//! A host-language loader reads `native/index.json` to find the library for
//! the platform it runs on instead of guessing a file name per OS.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ArtifactLocation, CollectFailure};
use crate::consts::{INDEX_FILE, INDEX_VERSION, NATIVE_DIR};
use crate::platform::Platform;
use crate::platform::arch::Arch;
use crate::platform::os::Os;
use crate::target::TargetSpec;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIndex {
  pub version: u32,
  /// Entries keyed by platform label.
  pub targets: BTreeMap<String, IndexEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
  pub triple: String,
  pub os: Os,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub arch: Option<Arch>,
  pub libraries: Vec<IndexLibrary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexLibrary {
  /// Path relative to the `native` directory, always `/`-separated.
  pub path: String,
  pub sha256: String,
}

impl Default for PackageIndex {
  fn default() -> Self {
    Self {
      version: INDEX_VERSION,
      targets: BTreeMap::new(),
    }
  }
}

impl PackageIndex {
  /// Location of the index under an output root.
  pub fn path(output_root: &Path) -> PathBuf {
    output_root.join(NATIVE_DIR).join(INDEX_FILE)
  }

  /// Read the index under `output_root`, if one exists.
  pub fn load(output_root: &Path) -> io::Result<Option<Self>> {
    let path = Self::path(output_root);
    if !path.exists() {
      return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    let index = serde_json::from_str(&content).map_err(io::Error::other)?;
    Ok(Some(index))
  }

  /// The entry whose OS and architecture match `platform`.
  pub fn entry_for(&self, platform: Platform) -> Option<(&str, &IndexEntry)> {
    self
      .targets
      .iter()
      .find(|(_, e)| e.os == platform.os && e.arch == Some(platform.arch))
      .map(|(label, e)| (label.as_str(), e))
  }

  /// The entry for the running host.
  pub fn entry_for_host(&self) -> Option<(&str, &IndexEntry)> {
    self.entry_for(Platform::current()?)
  }

  /// Replace the entries of the given targets with the collected libraries.
  pub fn update(&mut self, targets: &[&TargetSpec], collected: &[ArtifactLocation], native_dir: &Path) {
    for target in targets {
      let libraries = collected
        .iter()
        .filter(|loc| loc.label == target.label())
        .map(|loc| IndexLibrary {
          path: relative_path(&loc.destination, native_dir),
          sha256: loc.sha256.clone(),
        })
        .collect();

      self.targets.insert(
        target.label().to_string(),
        IndexEntry {
          triple: target.triple().to_string(),
          os: target.os(),
          arch: target.arch(),
          libraries,
        },
      );
    }
  }
}

fn relative_path(path: &Path, base: &Path) -> String {
  let relative = path.strip_prefix(base).unwrap_or(path);
  relative
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

/// Merge freshly collected targets into the index under `output_root`.
///
/// Entries for targets not collected in this run are kept, so collecting a
/// subset does not drop libraries collected earlier. An unreadable index is
/// replaced.
pub(crate) fn update_index(
  output_root: &Path,
  targets: &[&TargetSpec],
  collected: &[ArtifactLocation],
) -> Result<(), CollectFailure> {
  let path = PackageIndex::path(output_root);
  let native_dir = output_root.join(NATIVE_DIR);

  let mut index = match PackageIndex::load(output_root) {
    Ok(Some(index)) if index.version == INDEX_VERSION => index,
    Ok(Some(index)) => {
      warn!(version = index.version, "replacing package index with unsupported version");
      PackageIndex::default()
    }
    Ok(None) => PackageIndex::default(),
    Err(e) => {
      warn!(path = ?path, error = %e, "replacing unreadable package index");
      PackageIndex::default()
    }
  };

  index.update(targets, collected, &native_dir);

  let write = || -> io::Result<()> {
    fs::create_dir_all(&native_dir)?;
    let content = serde_json::to_string_pretty(&index).map_err(io::Error::other)?;
    let mut temp = tempfile::NamedTempFile::new_in(&native_dir)?;
    temp.write_all(content.as_bytes())?;
    temp.write_all(b"\n")?;
    temp.persist(&path).map_err(|e| e.error)?;
    Ok(())
  };

  write().map_err(|source| CollectFailure::Index {
    path: path.clone(),
    source,
  })?;

  debug!(path = ?path, targets = index.targets.len(), "wrote package index");
  Ok(())
}
