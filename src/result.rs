use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::time;

use crate::CONFIG;

/// Judge status of a submission or of a single test case.
///
/// `Waiting`, `Compiling` and `Judging` are the in-flight states; everything
/// else is a final verdict that never changes again.
#[derive(
  Debug, PartialEq, Eq, strum::EnumString, strum::Display, Serialize, Deserialize, Clone, Copy,
)]
#[strum(serialize_all = "snake_case")]
pub enum Status {
  Waiting,
  Compiling,
  Judging,
  Accepted,
  WrongAnswer,
  TimeLimitExceeded,
  MemoryLimitExceeded,
  RuntimeError,
  CompileError,
  InternalError,
}

impl Status {
  /// A terminal status is a verdict; an in-flight status is not.
  pub fn is_terminal(&self) -> bool {
    !matches!(self, Status::Waiting | Status::Compiling | Status::Judging)
  }
}

/// Result of one executed test case.
#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TestRecord {
  /// Ordinal of the test case inside its problem, starting from zero.
  pub test: usize,

  pub status: Status,

  /// CPU time consumed by the run.
  #[serde_as(as = "DurationMilliSeconds<u64>")]
  pub time: time::Duration,

  /// Peak resident memory of the run, in bytes.
  pub memory: u64,

  /// Truncated stdout, kept for wrong answers so the submitter can see what
  /// the program printed.
  pub stdout: Option<String>,

  /// Truncated stderr of the run.
  pub stderr: Option<String>,
}

/// Terminal outcome of judging one submission.
#[derive(Debug, Clone)]
pub struct Outcome {
  pub status: Status,

  /// Maximum CPU time observed across the executed tests.
  pub time: time::Duration,

  /// Maximum peak memory observed across the executed tests, in bytes.
  pub memory: u64,

  /// Diagnostic shown to the submitter, e.g. the compiler output.
  pub message: Option<String>,
}

/// Truncate a message to the configured display budget.
pub fn limit_message(s: &str) -> String {
  let limit = CONFIG.read().unwrap().judge.message_limit;
  if s.len() <= limit {
    return s.to_string();
  }
  let mut end = limit;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  return format!("{}...", &s[..end]);
}
