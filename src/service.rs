use std::{collections::HashMap, sync::Arc};

use log::info;
use uuid::Uuid;

use crate::{
  cooldown, error, generator, lang, problem, queue, sandbox, storage, submission, CONFIG,
};

/// Front door of the pipeline: accepts submissions, reports their state and
/// serves generator samples.
///
/// Everything heavier than a hash map lookup happens behind the queue; the
/// generator is the one exception and runs synchronously with its caller.
pub struct Service {
  problems: HashMap<String, Arc<problem::Problem>>,
  storage: Arc<dyn storage::Storage>,
  sandbox: Arc<dyn sandbox::Sandbox>,
  cooldown: cooldown::Guard,
  queue: queue::Queue,
}

impl Service {
  /// Wire up the pipeline and spawn its workers.
  pub fn start(
    problems: Vec<problem::Problem>,
    storage: Arc<dyn storage::Storage>,
    sandbox: Arc<dyn sandbox::Sandbox>,
  ) -> Self {
    let problems: HashMap<_, _> = problems
      .into_iter()
      .map(|p| (p.id.clone(), Arc::new(p)))
      .collect();
    let ctx = Arc::new(queue::Context {
      storage: storage.clone(),
      sandbox: sandbox.clone(),
      problems: problems.clone(),
    });
    let workers = CONFIG.read().unwrap().judge.workers;

    Self {
      problems,
      storage,
      sandbox,
      cooldown: cooldown::Guard::new(),
      queue: queue::Queue::start(ctx, workers),
    }
  }

  /// Accept a submission and enqueue it for judging.
  ///
  /// The cooldown is checked before anything is persisted, so a rejected
  /// request neither reaches the queue nor refreshes its own window.
  ///
  /// # Errors
  ///
  /// This function will return an error if the problem does not exist, the
  /// language is not allowed for it, or the user is still inside the
  /// submission cooldown window.
  pub async fn submit(
    &self,
    user: &str,
    problem_id: &str,
    lang: lang::Lang,
    code: String,
  ) -> Result<Uuid, error::Error> {
    let prob = self.problem(problem_id)?;
    if !prob.allows(&lang) {
      return Err(error::Error::UnsupportedLanguage {
        lang: lang.to_string(),
      });
    }
    self.cooldown.check(
      user,
      problem_id,
      cooldown::Kind::Submission,
      prob.submission_cooldown(),
    )?;

    let sub = submission::Submission::new(user, problem_id, lang, code);
    let id = sub.id;
    self.storage.create(sub).await?;
    self.queue.push(id)?;

    info!("submission {} of {} enqueued for problem {}", id, user, problem_id);
    return Ok(id);
  }

  /// Non-blocking snapshot of a submission: its state, the verdict once it
  /// is terminal, the per test records and the observed usage.
  pub async fn status(&self, id: Uuid) -> Result<submission::Submission, error::Error> {
    self.storage.get(id).await
  }

  /// Run the problem's generator and hand back a fresh sample.
  ///
  /// # Errors
  ///
  /// This function will return an error if the problem does not exist or
  /// has no generator, the user is inside the generator cooldown window, or
  /// the generator itself failed.
  pub async fn sample(
    &self,
    user: &str,
    problem_id: &str,
  ) -> Result<generator::Sample, error::Error> {
    let prob = self.problem(problem_id)?;
    if prob.generator.is_none() {
      return Err(error::Error::GeneratorUnavailable);
    }
    self.cooldown.check(
      user,
      problem_id,
      cooldown::Kind::Generator,
      prob.generator_cooldown(),
    )?;

    return generator::generate(self.sandbox.as_ref(), &prob).await;
  }

  /// Drain the queue and stop the workers.
  pub async fn shutdown(self) {
    self.queue.shutdown().await;
  }

  fn problem(&self, id: &str) -> Result<Arc<problem::Problem>, error::Error> {
    self
      .problems
      .get(id)
      .cloned()
      .ok_or_else(|| error::Error::ProblemNotFound(id.to_string()))
  }
}
