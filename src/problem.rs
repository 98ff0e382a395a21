use std::time;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

use crate::{file, lang, program, CONFIG};

/// Parsed problem, consumed read-only by the pipeline.
///
/// Loading problems from disk and keeping them fresh is the business of an
/// external collaborator; the pipeline only ever reads them.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
  pub id: String,

  /// CPU time limit per test case.
  #[serde_as(as = "DurationMilliSeconds<u64>")]
  pub time_limit: time::Duration,

  /// Memory limit per test case, in bytes.
  pub memory_limit: u64,

  /// Languages a submission may use.
  pub allowed_langs: Vec<lang::Lang>,

  /// Ordered test cases; the ordinal order is the judging order and decides
  /// which failure a short-circuited submission reports.
  pub tests: Vec<Test>,

  /// Custom validator. When absent the default output comparison is used.
  pub validator: Option<Script>,

  /// Sample generator.
  pub generator: Option<Script>,

  /// Cooldown overrides; the global config supplies the fallbacks.
  #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
  pub submission_cooldown: Option<time::Duration>,

  #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
  pub generator_cooldown: Option<time::Duration>,
}

/// A test case: one input and the expected answer, identified by its
/// position inside the problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
  pub input: file::File,
  pub answer: file::File,
}

/// An untrusted helper program attached to a problem, with its own limits.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
  pub source: program::Source,

  #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
  pub time_limit: Option<time::Duration>,

  pub memory_limit: Option<u64>,
}

impl Script {
  /// CPU time limit of one run, falling back to the sandbox default.
  pub fn time_limit(&self) -> time::Duration {
    self
      .time_limit
      .unwrap_or_else(|| CONFIG.read().unwrap().sandbox.time_limit)
  }

  /// Memory limit of one run in bytes, falling back to the sandbox default.
  pub fn memory_limit(&self) -> u64 {
    self
      .memory_limit
      .unwrap_or_else(|| CONFIG.read().unwrap().sandbox.memory_limit)
  }
}

impl Problem {
  pub fn allows(&self, lang: &lang::Lang) -> bool {
    self.allowed_langs.contains(lang)
  }

  pub fn submission_cooldown(&self) -> time::Duration {
    self
      .submission_cooldown
      .unwrap_or_else(|| CONFIG.read().unwrap().judge.submission_cooldown)
  }

  pub fn generator_cooldown(&self) -> time::Duration {
    self
      .generator_cooldown
      .unwrap_or_else(|| CONFIG.read().unwrap().judge.generator_cooldown)
  }
}
