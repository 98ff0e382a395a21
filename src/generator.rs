use serde::{Deserialize, Serialize};

use crate::{error, file, problem, sandbox, CONFIG};

/// A sample produced by a problem's generator.
///
/// The generator contract is fixed: everything the script writes to its
/// stdout is the sample input, everything it writes to its stderr is the
/// matching expected output. The two streams are captured separately and
/// returned untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sample {
  #[serde(with = "serde_bytes")]
  pub input: Vec<u8>,

  #[serde(with = "serde_bytes")]
  pub output: Vec<u8>,
}

/// Compile and run the generator of a problem, returning a fresh sample.
///
/// Runs synchronously relative to the caller and shares the sandbox with the
/// judging workers without occupying one of them.
///
/// # Errors
///
/// This function will return an error if the problem has no generator, or
/// the generator failed to compile, exited non-zero or violated its limits.
/// A failed generator run never touches any submission state.
pub async fn generate(
  sandbox: &dyn sandbox::Sandbox,
  problem: &problem::Problem,
) -> Result<Sample, error::Error> {
  let script = problem
    .generator
    .as_ref()
    .ok_or(error::Error::GeneratorUnavailable)?;

  let exec = script
    .source
    .compile(sandbox)
    .await
    .map_err(|err| error::Error::Internal(format!("generator compile failed: {}", err)))?;

  let res = sandbox
    .run(sandbox::Cmd {
      args: exec.run_cmd(),
      copy_in: [(
        exec.file_name(),
        file::File::Path(exec.path().to_path_buf()),
      )]
      .into(),
      time_limit: script.time_limit(),
      memory_limit: script.memory_limit(),
      // The sample output travels on stderr, so it gets the stdout budget
      // instead of the short diagnostics cap.
      stderr_limit: CONFIG.read().unwrap().sandbox.stdout_limit,
      ..Default::default()
    })
    .await;

  if res.status != sandbox::Status::Accepted {
    return Err(error::Error::Internal(format!(
      "generator {}",
      error::RuntimeError::from(res)
    )));
  }

  return Ok(Sample {
    input: res.stdout,
    output: res.stderr,
  });
}
