//! Content hashing for collected artifacts.
//!
//! Collection compares source and destination by SHA-256 so that re-running
//! it leaves identical files untouched, and records the hash in the package
//! index for loaders that want to verify what they extract.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A full 64-character SHA256 hash of file contents.
///
/// The hash is a lowercase hexadecimal string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Hash a file's contents.
pub fn hash_file(path: &Path) -> io::Result<ContentHash> {
  let mut file = fs::File::open(path)?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Whether two files have identical contents.
///
/// A missing `b` compares unequal; a missing `a` is an error.
pub fn same_contents(a: &Path, b: &Path) -> io::Result<bool> {
  if !b.exists() {
    return Ok(false);
  }
  let (a_meta, b_meta) = (fs::metadata(a)?, fs::metadata(b)?);
  if a_meta.len() != b_meta.len() {
    return Ok(false);
  }
  Ok(hash_file(a)? == hash_file(b)?)
}
