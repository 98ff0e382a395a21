use std::{collections::HashMap, time};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

/// Execution result of one `Cmd`.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResult {
  pub status: Status,

  /// Consumed CPU time.
  #[serde_as(as = "DurationMilliSeconds<u64>")]
  pub time: time::Duration,

  /// Real time between spawn and reap.
  #[serde_as(as = "DurationMilliSeconds<u64>")]
  pub wall_time: time::Duration,

  /// Peak resident memory in bytes, measured even when the process was
  /// killed for crossing the limit.
  pub memory: u64,

  pub exit_code: i32,

  /// Captured stdout, truncated to the request limit.
  #[serde(with = "serde_bytes")]
  pub stdout: Vec<u8>,

  /// Captured stderr, truncated to the request limit.
  #[serde(with = "serde_bytes")]
  pub stderr: Vec<u8>,

  /// Contents of the requested copy out files; missing files are skipped.
  #[serde(skip)]
  pub files: HashMap<String, Vec<u8>>,
}

/// Status of one sandboxed run.
///
/// This enum only describes how the process itself behaved; whether its
/// answer is correct is decided later by the judge.
#[derive(
  Debug, PartialEq, Eq, strum::EnumString, strum::Display, Serialize, Deserialize, Clone, Copy,
)]
#[strum(serialize_all = "snake_case")]
pub enum Status {
  Accepted,
  TimeLimitExceeded,
  MemoryLimitExceeded,
  ProcessLimitExceeded,
  NonZeroExitStatus,
  Signalled,
  /// The sandbox itself could not be constructed or supervised. Never
  /// caused by the command under test.
  InternalError,
}

impl ExecuteResult {
  /// Result reported when the sandbox cannot be set up at all.
  pub fn internal_error(message: &str) -> Self {
    Self {
      status: Status::InternalError,
      time: time::Duration::ZERO,
      wall_time: time::Duration::ZERO,
      memory: 0,
      exit_code: -1,
      stdout: vec![],
      stderr: message.as_bytes().to_vec(),
      files: [].into(),
    }
  }
}
