use std::time;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use uuid::Uuid;

use crate::{lang, result};

/// A judged piece of user code.
///
/// The source is immutable once created. While in flight the record is
/// driven by exactly one queue worker; everybody else reads snapshots
/// through the storage layer. Per test records are append only and keep the
/// judging order.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
  pub id: Uuid,

  pub user: String,

  pub problem: String,

  pub lang: lang::Lang,

  pub code: String,

  pub status: result::Status,

  /// Per test records in judging order.
  pub records: Vec<result::TestRecord>,

  /// Maximum CPU time observed across the executed tests.
  #[serde_as(as = "DurationMilliSeconds<u64>")]
  pub time: time::Duration,

  /// Maximum peak memory observed across the executed tests, in bytes.
  pub memory: u64,

  /// Diagnostic shown to the submitter, e.g. the compiler output.
  pub message: Option<String>,

  pub created_at: DateTime<Utc>,

  pub started_at: Option<DateTime<Utc>>,

  pub finished_at: Option<DateTime<Utc>>,
}

impl Submission {
  /// A fresh record in the waiting state.
  pub fn new(user: &str, problem: &str, lang: lang::Lang, code: String) -> Self {
    Self {
      id: Uuid::new_v4(),
      user: user.to_string(),
      problem: problem.to_string(),
      lang,
      code,
      status: result::Status::Waiting,
      records: vec![],
      time: time::Duration::ZERO,
      memory: 0,
      message: None,
      created_at: Utc::now(),
      started_at: None,
      finished_at: None,
    }
  }
}
