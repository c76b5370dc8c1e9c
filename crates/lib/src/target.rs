//! Target table: the static, ordered mapping of platform labels to target triples.
//!
//! The table is fixed when the orchestrator is constructed. Everything the task
//! graph and the artifact layout need (task names, output directories, library
//! extensions) is derived from it, so the whole pipeline can be inspected
//! before any toolchain process runs.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::platform::Platform;
use crate::platform::arch::Arch;
use crate::platform::os::Os;

/// Targets the native engine is packaged for unless a table is supplied.
pub const DEFAULT_TARGETS: &[(&str, &str)] = &[
  ("Linux-x86_64", "x86_64-unknown-linux-gnu"),
  ("Linux-aarch64", "aarch64-unknown-linux-gnu"),
  ("Windows-x86_64", "x86_64-pc-windows-gnu"),
  ("macOS-x86_64", "x86_64-apple-darwin"),
  ("macOS-aarch64", "aarch64-apple-darwin"),
];

/// Errors raised while building or querying a target table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
  #[error("target table is empty")]
  Empty,

  #[error("platform label must not be empty")]
  EmptyLabel,

  #[error("target triple for {label} must not be empty")]
  EmptyTriple { label: String },

  #[error("platform label {label:?} contains characters outside [A-Za-z0-9._-]")]
  InvalidLabel { label: String },

  #[error("platform label {label:?} is declared more than once (conflicts with {existing:?})")]
  DuplicateLabel { label: String, existing: String },

  #[error("cannot determine the operating system of target triple {triple:?}")]
  UnsupportedTriple { triple: String },

  #[error("unknown platform label: {0}")]
  UnknownLabel(String),
}

/// One platform/architecture combination the native library is built for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TargetSpec {
  label: String,
  triple: String,
  #[serde(skip)]
  os: Os,
  #[serde(skip)]
  arch: Option<Arch>,
}

impl TargetSpec {
  /// Create a target from a label and triple.
  ///
  /// The triple must name a Linux, macOS or Windows target so that the
  /// shared-library extension of its artifacts is known.
  pub fn new(label: impl Into<String>, triple: impl Into<String>) -> Result<Self, TargetError> {
    let label = label.into();
    let triple = triple.into();

    if label.is_empty() {
      return Err(TargetError::EmptyLabel);
    }
    if !is_valid_label(&label) {
      return Err(TargetError::InvalidLabel { label });
    }
    if triple.is_empty() {
      return Err(TargetError::EmptyTriple { label });
    }

    let os = Os::from_triple(&triple).ok_or_else(|| TargetError::UnsupportedTriple { triple: triple.clone() })?;
    let arch = Arch::from_triple(&triple);

    Ok(Self {
      label,
      triple,
      os,
      arch,
    })
  }

  /// Human-readable platform label, e.g. `Linux-x86_64`.
  pub fn label(&self) -> &str {
    &self.label
  }

  /// Toolchain target triple, e.g. `x86_64-unknown-linux-gnu`.
  pub fn triple(&self) -> &str {
    &self.triple
  }

  pub fn os(&self) -> Os {
    self.os
  }

  pub fn arch(&self) -> Option<Arch> {
    self.arch
  }

  /// Shared-library extension produced for this target (`so`, `dylib` or `dll`).
  pub fn library_extension(&self) -> &'static str {
    self.os.library_extension()
  }

  /// The platform this target compiles for, when its architecture is known.
  pub fn platform(&self) -> Option<Platform> {
    Some(Platform::new(self.arch?, self.os))
  }
}

impl fmt::Display for TargetSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.label, self.triple)
  }
}

/// Labels end up as task names and directory names.
fn is_valid_label(label: &str) -> bool {
  label != "."
    && label != ".."
    && label
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// An ordered, validated set of targets with unique labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TargetTable {
  targets: Vec<TargetSpec>,
}

impl TargetTable {
  /// Validate a sequence of targets.
  ///
  /// Labels are compared case-insensitively because they become directory
  /// names in the output layout, and `Linux-x86_64` / `linux-x86_64` would
  /// collide on case-insensitive filesystems.
  pub fn new(targets: Vec<TargetSpec>) -> Result<Self, TargetError> {
    if targets.is_empty() {
      return Err(TargetError::Empty);
    }

    let mut seen_labels: HashMap<String, &str> = HashMap::new();
    let mut seen_triples: HashMap<&str, &str> = HashMap::new();

    for target in &targets {
      let key = target.label.to_ascii_lowercase();
      if let Some(existing) = seen_labels.get(&key) {
        return Err(TargetError::DuplicateLabel {
          label: target.label.clone(),
          existing: existing.to_string(),
        });
      }
      seen_labels.insert(key, &target.label);

      if let Some(other) = seen_triples.insert(&target.triple, &target.label) {
        warn!(
          triple = %target.triple,
          first = other,
          second = %target.label,
          "two labels share a target triple and therefore a toolchain output directory"
        );
      }
    }

    Ok(Self { targets })
  }

  /// Build a table from `(label, triple)` pairs.
  pub fn from_pairs<L, T>(pairs: impl IntoIterator<Item = (L, T)>) -> Result<Self, TargetError>
  where
    L: Into<String>,
    T: Into<String>,
  {
    let targets = pairs
      .into_iter()
      .map(|(label, triple)| TargetSpec::new(label, triple))
      .collect::<Result<Vec<_>, _>>()?;
    Self::new(targets)
  }

  /// The built-in table, see [`DEFAULT_TARGETS`].
  pub fn builtin() -> Result<Self, TargetError> {
    Self::from_pairs(DEFAULT_TARGETS.iter().copied())
  }

  pub fn iter(&self) -> std::slice::Iter<'_, TargetSpec> {
    self.targets.iter()
  }

  pub fn as_slice(&self) -> &[TargetSpec] {
    &self.targets
  }

  pub fn len(&self) -> usize {
    self.targets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.targets.is_empty()
  }

  /// Look up a target by its exact label.
  pub fn get(&self, label: &str) -> Option<&TargetSpec> {
    self.targets.iter().find(|t| t.label == label)
  }

  /// Select a subset of targets by label, preserving table order.
  ///
  /// An empty selection means every target.
  pub fn select<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<TargetSpec>, TargetError> {
    if labels.is_empty() {
      return Ok(self.targets.clone());
    }

    for label in labels {
      if self.get(label.as_ref()).is_none() {
        return Err(TargetError::UnknownLabel(label.as_ref().to_string()));
      }
    }

    Ok(
      self
        .targets
        .iter()
        .filter(|t| labels.iter().any(|l| l.as_ref() == t.label))
        .cloned()
        .collect(),
    )
  }

  /// The first target whose platform matches the running host.
  pub fn host_target(&self) -> Option<&TargetSpec> {
    let host = Platform::current()?;
    self.targets.iter().find(|t| t.platform() == Some(host))
  }
}

impl<'a> IntoIterator for &'a TargetTable {
  type Item = &'a TargetSpec;
  type IntoIter = std::slice::Iter<'a, TargetSpec>;

  fn into_iter(self) -> Self::IntoIter {
    self.targets.iter()
  }
}
