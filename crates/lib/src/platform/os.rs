use std::fmt;

use serde::{Deserialize, Serialize};

/// Operating system families a target triple can build for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
  Linux,
  #[serde(rename = "darwin")]
  MacOs,
  Windows,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Derive the OS family from a target triple.
  ///
  /// Triples are `arch-vendor-os[-abi]`; only the vendor/os components are
  /// inspected, so `x86_64-pc-windows-msvc` and `x86_64-pc-windows-gnu` both
  /// map to Windows.
  pub fn from_triple(triple: &str) -> Option<Self> {
    let rest: Vec<&str> = triple.split('-').skip(1).collect();

    if rest.contains(&"windows") {
      Some(Self::Windows)
    } else if rest.contains(&"apple") || rest.contains(&"darwin") {
      Some(Self::MacOs)
    } else if rest.contains(&"linux") {
      Some(Self::Linux)
    } else {
      None
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
      Self::Windows => "windows",
    }
  }

  /// File extension (without the dot) of shared libraries on this OS.
  pub fn library_extension(&self) -> &'static str {
    match self {
      Self::Linux => "so",
      Self::MacOs => "dylib",
      Self::Windows => "dll",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
