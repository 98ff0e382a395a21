use std::time;

use thiserror::Error;
use uuid::Uuid;

use crate::sandbox;

/// Error when a run does not execute normally inside the sandbox
/// (result != Accepted).
#[derive(Debug, Error, Clone)]
#[error(
    "run failed (status: {0}, time: {1:?}, memory: {2} bytes, exit code: {3})",
    result.status, result.time, result.memory, result.exit_code
  )]
pub struct RuntimeError {
  pub result: sandbox::ExecuteResult,
}

impl From<sandbox::ExecuteResult> for RuntimeError {
  fn from(result: sandbox::ExecuteResult) -> Self {
    Self { result }
  }
}

/// Error when a program does not compile successful.
#[derive(Debug, Error, Clone)]
#[error(
    "compile failed (status: {0}, exit code: {1}): {message}",
    result.status, result.exit_code
  )]
pub struct CompileError {
  pub result: sandbox::ExecuteResult,

  /// Compile message, usually the error message output by the compiler.
  pub message: String,
}

impl CompileError {
  /// A compile failure caused by the judge itself rather than the code.
  pub fn internal(message: &str) -> Self {
    Self {
      result: sandbox::ExecuteResult::internal_error(message),
      message: message.to_string(),
    }
  }
}

/// Errors surfaced to the callers of the service interface.
#[derive(Debug, Error)]
pub enum Error {
  #[error("please wait {remaining:?} before making another request")]
  Cooldown { remaining: time::Duration },

  #[error("language {lang} is not allowed for this problem")]
  UnsupportedLanguage { lang: String },

  #[error("problem not found: {0}")]
  ProblemNotFound(String),

  #[error("submission not found: {0}")]
  SubmissionNotFound(Uuid),

  #[error("no generator is configured for this problem")]
  GeneratorUnavailable,

  #[error("internal judge error: {0}")]
  Internal(String),
}
