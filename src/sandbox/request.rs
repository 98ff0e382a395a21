use std::{collections::HashMap, time};

use crate::{file, CONFIG};

/// A single command to run inside the sandbox.
///
/// A request is built fresh for every execution and never reused; the
/// scratch directory backing it is created and discarded per run, so no
/// filesystem state leaks between two runs of the same program.
#[derive(Debug, Clone)]
pub struct Cmd {
  /// Command line argument.
  pub args: Vec<String>,

  /// Environment variables.
  pub env: Vec<String>,

  /// CPU time limit to run this command.
  pub time_limit: time::Duration,

  /// Memory limit in byte.
  pub memory_limit: u64,

  /// Process count limit for the whole tree spawned by the command.
  pub process_limit: u64,

  /// Stdin of the command.
  ///
  /// If this field is None the command runs on an empty input.
  pub stdin: Option<file::File>,

  /// Copy the correspond file into the scratch directory before the run.
  pub copy_in: HashMap<String, file::File>,

  /// Names of scratch files to read back after the run.
  pub copy_out: Vec<String>,

  /// Capture limit for stdout, in bytes.
  pub stdout_limit: u64,

  /// Capture limit for stderr, in bytes.
  pub stderr_limit: u64,
}

impl Cmd {
  /// Real time ceiling of the run.
  ///
  /// Guards programs that sleep or block without consuming CPU; generously
  /// above the CPU limit so it never fires first on a loaded host.
  pub fn wall_limit(&self) -> time::Duration {
    self.time_limit * 2 + CONFIG.read().unwrap().sandbox.wall_clock_margin
  }
}

impl Default for Cmd {
  fn default() -> Self {
    let c = CONFIG.read().unwrap().sandbox.clone();
    Self {
      args: vec![],
      env: c.env,
      time_limit: c.time_limit,
      memory_limit: c.memory_limit,
      process_limit: c.process_limit,
      stdin: None,
      copy_in: [].into(),
      copy_out: vec![],
      stdout_limit: c.stdout_limit,
      stderr_limit: c.stderr_limit,
    }
  }
}
