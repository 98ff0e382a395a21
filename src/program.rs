use std::{
  fs,
  os::unix::fs::PermissionsExt,
  path::{Path, PathBuf},
  sync::Arc,
};

use log::debug;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::{error, file, lang, sandbox};

/// A piece of source code in some language.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Source {
  pub lang: lang::Lang,
  pub code: file::File,
}

/// A program ready to run: its language plus the cached artifact.
///
/// The artifact directory is private to this value, produced by exactly one
/// compile, and reused for every later run of the program. It is removed
/// when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Executable {
  pub lang: lang::Lang,
  _dir: Arc<TempDir>,
  path: PathBuf,
}

impl Executable {
  /// Path of the cached artifact (or staged source) file.
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// File name the artifact must have inside a scratch directory.
  pub fn file_name(&self) -> String {
    let cfg = self.lang.cfg();
    match cfg.compile_cmd {
      Some(_) => cfg.exec,
      None => cfg.source,
    }
  }

  /// Argv that runs the program inside a scratch directory.
  pub fn run_cmd(&self) -> Vec<String> {
    self.lang.cfg().run_cmd
  }
}

impl Source {
  /// Compile the source and return the runnable program.
  ///
  /// It will do these following:
  ///
  /// 1. Constructs a sandbox request according to the code language.
  /// 2. Executes the request under the generous non-solution limits.
  /// 3. Caches the produced artifact in a private directory so every later
  ///    run reuses it instead of recompiling.
  ///
  /// Interpreted languages skip the sandbox round trip and only stage the
  /// source file.
  ///
  /// # Errors
  ///
  /// This function will return an error if the toolchain rejects the code,
  /// a limit was exceeded during compilation, or the sandbox itself failed;
  /// the compiler's stderr is carried along for diagnostics.
  pub async fn compile(
    &self,
    sandbox: &dyn sandbox::Sandbox,
  ) -> Result<Executable, error::CompileError> {
    let cfg = self.lang.cfg();

    let dir = tempfile::Builder::new()
      .prefix("arbiter-artifact-")
      .tempdir()
      .map_err(|err| error::CompileError::internal(&format!("artifact dir failed: {}", err)))?;

    let path = match &cfg.compile_cmd {
      None => {
        let path = dir.path().join(&cfg.source);
        let code = self
          .code
          .read()
          .map_err(|err| error::CompileError::internal(&format!("source unreadable: {}", err)))?;
        fs::write(&path, code)
          .map_err(|err| error::CompileError::internal(&format!("source staging failed: {}", err)))?;
        path
      }
      Some(compile_cmd) => {
        debug!("compile for {} start", &cfg.exec);

        let res = sandbox
          .run(sandbox::Cmd {
            args: compile_cmd.clone(),
            copy_in: [(cfg.source.clone(), self.code.clone())].into(),
            copy_out: vec![cfg.exec.clone()],
            ..Default::default()
          })
          .await;

        if res.status != sandbox::Status::Accepted {
          let message = String::from_utf8_lossy(&res.stderr).to_string();
          return Err(error::CompileError {
            result: res,
            message: match message.is_empty() {
              true => "no compile message".to_string(),
              false => message,
            },
          });
        }

        let artifact = match res.files.get(&cfg.exec) {
          Some(artifact) => artifact,
          None => {
            return Err(error::CompileError::internal(
              "compiler succeeded but produced no artifact",
            ))
          }
        };

        let path = dir.path().join(&cfg.exec);
        fs::write(&path, artifact).map_err(|err| {
          error::CompileError::internal(&format!("artifact caching failed: {}", err))
        })?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).map_err(|err| {
          error::CompileError::internal(&format!("artifact chmod failed: {}", err))
        })?;

        debug!("compile for {} finished", &cfg.exec);
        path
      }
    };

    return Ok(Executable {
      lang: self.lang.clone(),
      _dir: Arc::new(dir),
      path,
    });
  }
}
