use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::RwLock, time};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
/// Arbiter judge config.
pub struct Cfg {
  pub lang: HashMap<String, LangCfg>,

  pub sandbox: SandboxCfg,

  pub judge: JudgeCfg,
}

impl Default for Cfg {
  // Set default values for config
  fn default() -> Self {
    return Cfg {
      lang: HashMap::from([
        (
          "python".to_string(),
          LangCfg {
            compile_cmd: None,
            run_cmd: ["/usr/bin/python3", "main.py"]
              .iter()
              .map(|&s| s.into())
              .collect(),
            source: "main.py".to_string(),
            exec: "main.py".to_string(),
          },
        ),
        (
          "c".to_string(),
          LangCfg {
            compile_cmd: Some(
              [
                "/usr/bin/gcc",
                "main.c",
                "-o",
                "main",
                "-O2",
                "-std=c11",
                "-lm",
              ]
              .iter()
              .map(|&s| s.into())
              .collect(),
            ),
            run_cmd: vec!["./main".to_string()],
            source: "main.c".to_string(),
            exec: "main".to_string(),
          },
        ),
        (
          "cpp".to_string(),
          LangCfg {
            compile_cmd: Some(
              ["/usr/bin/g++", "main.cpp", "-o", "main", "-O2", "-std=c++17"]
                .iter()
                .map(|&s| s.into())
                .collect(),
            ),
            run_cmd: vec!["./main".to_string()],
            source: "main.cpp".to_string(),
            exec: "main".to_string(),
          },
        ),
      ]),
      sandbox: SandboxCfg {
        env: vec![
          "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin".to_string(),
        ],
        time_limit: time::Duration::from_secs(10),
        memory_limit: 1024 * 1024 * 1024, // 1 GB
        process_limit: 16,                // 16 processes
        stdout_limit: 64 * 1024 * 1024,   // 64 MB
        stderr_limit: 16 * 1024,          // 16 kB
        wall_clock_margin: time::Duration::from_secs(5),
        cgroup: "arbiter".to_string(),
        chroot: false,
        mounts: ["/usr", "/lib", "/lib64", "/bin"]
          .iter()
          .map(|&s| s.into())
          .collect(),
      },
      judge: JudgeCfg {
        workers: 4,
        submission_cooldown: time::Duration::from_secs(10),
        generator_cooldown: time::Duration::from_secs(10),
        message_limit: 4096,
      },
    };
  }
}

/// Programming language config.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LangCfg {
  /// Compile command, absent for interpreted languages.
  pub compile_cmd: Option<Vec<String>>,

  pub run_cmd: Vec<String>,

  /// Name of source file
  pub source: String,

  /// Name of executable file
  pub exec: String,
}

/// Sandbox config.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SandboxCfg {
  /// Environment variables.
  pub env: Vec<String>,

  /// CPU time limit for compilation and for running non-solution programs
  /// such as validators and generators.
  pub time_limit: time::Duration,

  /// Memory limit for compilation and running non-solution programs in bytes.
  pub memory_limit: u64,

  /// Default process count limit.
  pub process_limit: u64,

  /// Default stdout capture limit, in bytes.
  pub stdout_limit: u64,

  /// Default stderr capture limit, in bytes.
  pub stderr_limit: u64,

  /// Extra real time allowance on top of twice the CPU limit.
  pub wall_clock_margin: time::Duration,

  /// Name of the cgroup tree runs are placed under.
  pub cgroup: String,

  /// Pivot each run into its scratch directory, with the mounts below bound
  /// read-only inside it. Needs privileges; leave off for development.
  pub chroot: bool,

  /// Host directories bind mounted read-only inside the sandbox root.
  pub mounts: Vec<String>,
}

/// Judging pipeline config.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JudgeCfg {
  /// Number of queue workers judging submissions concurrently.
  pub workers: usize,

  /// Fallback cooldown between two submissions of one user on one problem.
  pub submission_cooldown: time::Duration,

  /// Fallback cooldown between two generator requests of one user on one
  /// problem.
  pub generator_cooldown: time::Duration,

  /// Byte budget for stdout/stderr kept on a test record.
  pub message_limit: usize,
}

lazy_static! {
  /// Global config.
  pub static ref CONFIG: RwLock<Cfg> = RwLock::new(Cfg::default());
}

/// Load the global config.
///
/// It should be called on the top of `main` fn.
pub fn load_config(search_paths: &Vec<String>) {
  let mut builder = config::Config::builder()
    .add_source(config::File::with_name("/etc/arbiter/judge").required(false));

  for p in search_paths {
    builder = builder.add_source(config::File::with_name(p.as_str()).required(false));
  }

  builder = builder.add_source(config::Environment::with_prefix("ARBITER_JUDGE"));

  match builder.build().and_then(|c| c.try_deserialize::<Cfg>()) {
    Ok(cfg) => *CONFIG.write().unwrap() = cfg,
    Err(err) => log::warn!("failed to load config, keeping defaults: {}", err),
  }
}
