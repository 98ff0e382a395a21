use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{error, result, submission};

/// Persistence seam for submission records.
///
/// The pipeline only needs these few operations; everything fancier lives
/// with the real storage collaborator. A write by the worker owning a
/// submission must be visible to every later read of the same id.
#[async_trait]
pub trait Storage: Send + Sync {
  /// Persist a fresh submission record.
  async fn create(&self, sub: submission::Submission) -> Result<(), error::Error>;

  /// Snapshot of a submission.
  async fn get(&self, id: Uuid) -> Result<submission::Submission, error::Error>;

  /// Move a submission into a new in-flight state, stamping `started_at` on
  /// the first transition out of waiting.
  async fn set_status(&self, id: Uuid, status: result::Status) -> Result<(), error::Error>;

  /// Append the record of one executed test.
  async fn append_record(&self, id: Uuid, record: result::TestRecord)
    -> Result<(), error::Error>;

  /// Store the terminal verdict together with the aggregated usage.
  async fn finish(&self, id: Uuid, outcome: result::Outcome) -> Result<(), error::Error>;
}

/// In-memory storage used by the binary and the tests.
#[derive(Debug, Default)]
pub struct MemStorage {
  subs: RwLock<HashMap<Uuid, submission::Submission>>,
}

impl MemStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Storage for MemStorage {
  async fn create(&self, sub: submission::Submission) -> Result<(), error::Error> {
    self.subs.write().await.insert(sub.id, sub);
    Ok(())
  }

  async fn get(&self, id: Uuid) -> Result<submission::Submission, error::Error> {
    self
      .subs
      .read()
      .await
      .get(&id)
      .cloned()
      .ok_or(error::Error::SubmissionNotFound(id))
  }

  async fn set_status(&self, id: Uuid, status: result::Status) -> Result<(), error::Error> {
    let mut subs = self.subs.write().await;
    let sub = subs
      .get_mut(&id)
      .ok_or(error::Error::SubmissionNotFound(id))?;
    if sub.started_at.is_none() && status != result::Status::Waiting {
      sub.started_at = Some(Utc::now());
    }
    sub.status = status;
    Ok(())
  }

  async fn append_record(
    &self,
    id: Uuid,
    record: result::TestRecord,
  ) -> Result<(), error::Error> {
    let mut subs = self.subs.write().await;
    let sub = subs
      .get_mut(&id)
      .ok_or(error::Error::SubmissionNotFound(id))?;
    sub.records.push(record);
    Ok(())
  }

  async fn finish(&self, id: Uuid, outcome: result::Outcome) -> Result<(), error::Error> {
    let mut subs = self.subs.write().await;
    let sub = subs
      .get_mut(&id)
      .ok_or(error::Error::SubmissionNotFound(id))?;
    sub.status = outcome.status;
    sub.time = outcome.time;
    sub.memory = outcome.memory;
    sub.message = outcome.message;
    sub.finished_at = Some(Utc::now());
    Ok(())
  }
}
