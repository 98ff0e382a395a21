use std::{io, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Data provider for source code, test case and script files.
///
/// Small payloads live in memory; large fixtures stay on disk and are only
/// read when staged into a sandbox scratch directory.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum File {
  #[serde(with = "serde_bytes")]
  Memory(Vec<u8>),
  Path(PathBuf),
}

impl File {
  /// Read the full content of the provider.
  pub fn read(&self) -> io::Result<Vec<u8>> {
    match self {
      Self::Memory(m) => Ok(m.clone()),
      Self::Path(p) => std::fs::read(p),
    }
  }
}

impl From<Vec<u8>> for File {
  fn from(f: Vec<u8>) -> Self {
    Self::Memory(f)
  }
}

impl From<&str> for File {
  fn from(f: &str) -> Self {
    Self::Memory(f.as_bytes().to_vec())
  }
}

impl From<PathBuf> for File {
  fn from(f: PathBuf) -> Self {
    Self::Path(f)
  }
}
