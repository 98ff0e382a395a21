use std::{collections::HashMap, sync::Arc, time};

use log::{error, info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{error, judge, problem, result, sandbox, storage};

/// Everything a worker needs to process submissions.
pub struct Context {
  pub storage: Arc<dyn storage::Storage>,
  pub sandbox: Arc<dyn sandbox::Sandbox>,
  pub problems: HashMap<String, Arc<problem::Problem>>,
}

/// Ordered queue of submission ids with a fixed pool of workers.
///
/// Ids are handed out first in, first out, and each id reaches exactly one
/// worker, so a submission is never judged twice concurrently. Tests inside
/// one submission run sequentially on the worker that claimed it; different
/// submissions run in parallel across the pool.
pub struct Queue {
  tx: mpsc::UnboundedSender<Uuid>,
  workers: Vec<JoinHandle<()>>,
}

impl Queue {
  /// Spawn the worker pool.
  pub fn start(ctx: Arc<Context>, workers: usize) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    let rx = Arc::new(Mutex::new(rx));
    let workers = (0..workers)
      .map(|id| {
        let ctx = ctx.clone();
        let rx = rx.clone();
        tokio::spawn(async move { worker(id, ctx, rx).await })
      })
      .collect();
    Self { tx, workers }
  }

  /// Enqueue a submission for judging.
  pub fn push(&self, id: Uuid) -> Result<(), error::Error> {
    self
      .tx
      .send(id)
      .map_err(|_| error::Error::Internal("judging queue is closed".to_string()))
  }

  /// Close the queue and wait for the workers to drain it.
  pub async fn shutdown(self) {
    drop(self.tx);
    futures::future::join_all(self.workers).await;
  }
}

async fn worker(
  id: usize,
  ctx: Arc<Context>,
  rx: Arc<Mutex<mpsc::UnboundedReceiver<Uuid>>>,
) {
  info!("judge worker {} started", id);
  loop {
    // Holding the lock only while waiting serializes the dequeue, not the
    // judging that follows it.
    let sub_id = { rx.lock().await.recv().await };
    let sub_id = match sub_id {
      Some(sub_id) => sub_id,
      None => break,
    };

    if let Err(err) = process(&ctx, sub_id).await {
      error!("worker {}: judging submission {} failed: {}", id, sub_id, err);
      // Whatever went wrong, the submission must not stay in flight.
      let outcome = result::Outcome {
        status: result::Status::InternalError,
        time: time::Duration::ZERO,
        memory: 0,
        message: Some("internal judge error".to_string()),
      };
      if let Err(err) = ctx.storage.finish(sub_id, outcome).await {
        error!(
          "worker {}: could not mark submission {} as failed: {}",
          id, sub_id, err
        );
      }
    }
  }
  info!("judge worker {} stopped", id);
}

async fn process(ctx: &Context, id: Uuid) -> Result<(), error::Error> {
  let sub = ctx.storage.get(id).await?;
  if sub.status.is_terminal() {
    warn!("submission {} is already terminal, skipping", id);
    return Ok(());
  }

  let prob = ctx
    .problems
    .get(&sub.problem)
    .ok_or_else(|| error::Error::ProblemNotFound(sub.problem.clone()))?;

  let outcome = judge::judge_submission(ctx.sandbox.as_ref(), ctx.storage.as_ref(), prob, &sub)
    .await?;
  info!("submission {} judged: {}", id, outcome.status);

  return ctx.storage.finish(id, outcome).await;
}
