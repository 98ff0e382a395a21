#[cfg(test)]
mod test;

pub mod args;
pub mod checker;
pub mod cooldown;
pub mod error;
pub mod etc;
pub mod file;
pub mod generator;
pub mod judge;
pub mod lang;
pub mod problem;
pub mod program;
pub mod queue;
pub mod result;
pub mod sandbox;
pub mod service;
pub mod storage;
pub mod submission;
pub mod validator;

use std::{error::Error, fs, sync::Arc};

use clap::Parser;

pub use crate::etc::CONFIG;

#[macro_use]
extern crate lazy_static;
extern crate log;

fn main() -> Result<(), Box<dyn Error>> {
  let args = args::Args::parse();
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
  etc::load_config(&args.config_search_path);

  let problems: Vec<problem::Problem> = match &args.problems {
    Some(path) => serde_json::from_slice(&fs::read(path)?)?,
    None => vec![],
  };

  let runtime = tokio::runtime::Runtime::new()?;
  runtime.block_on(async {
    let service = service::Service::start(
      problems,
      Arc::new(storage::MemStorage::new()),
      Arc::new(sandbox::LinuxSandbox),
    );
    log::info!(
      "arbiter ready with {} worker(s)",
      CONFIG.read().unwrap().judge.workers
    );

    tokio::signal::ctrl_c().await?;
    log::info!("shutting down");
    service.shutdown().await;
    Ok(())
  })
}
