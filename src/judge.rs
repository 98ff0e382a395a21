use std::time;

use log::{debug, warn};

use crate::{
  checker, error, file, problem, program, result, sandbox, storage, submission, validator,
};

/// Map a sandbox run status onto a verdict.
///
/// A violated limit wins over everything else the run did; an abnormal exit
/// with no violated limit is a runtime error; a clean exit is not a verdict
/// yet and still has to pass output comparison.
pub fn classify(res: &sandbox::ExecuteResult) -> result::Status {
  match res.status {
    sandbox::Status::Accepted => result::Status::Accepted,
    sandbox::Status::TimeLimitExceeded => result::Status::TimeLimitExceeded,
    sandbox::Status::MemoryLimitExceeded => result::Status::MemoryLimitExceeded,
    sandbox::Status::ProcessLimitExceeded
    | sandbox::Status::Signalled
    | sandbox::Status::NonZeroExitStatus => result::Status::RuntimeError,
    sandbox::Status::InternalError => result::Status::InternalError,
  }
}

/// Judge one test case.
///
/// It will do these following:
///
/// 1. Runs the program on the test input under the problem limits, with a
///    fresh scratch directory.
/// 2. Classifies the run; only a clean exit moves on to output comparison.
/// 3. Compares the output, through the problem's validator when it has one
///    and through the default comparison otherwise.
pub async fn judge_test(
  sandbox: &dyn sandbox::Sandbox,
  prob: &problem::Problem,
  exec: &program::Executable,
  val: Option<&validator::Validator>,
  ordinal: usize,
  test: &problem::Test,
) -> result::TestRecord {
  let res = sandbox
    .run(sandbox::Cmd {
      args: exec.run_cmd(),
      stdin: Some(test.input.clone()),
      copy_in: [(
        exec.file_name(),
        file::File::Path(exec.path().to_path_buf()),
      )]
      .into(),
      time_limit: prob.time_limit,
      memory_limit: prob.memory_limit,
      ..Default::default()
    })
    .await;

  let status = match classify(&res) {
    result::Status::Accepted => match val {
      Some(val) => {
        val
          .validate(
            sandbox,
            test.input.clone(),
            res.stdout.clone(),
            test.answer.clone(),
          )
          .await
      }
      None => match test.answer.read() {
        Ok(answer) if checker::check(&res.stdout, &answer) => result::Status::Accepted,
        Ok(_) => result::Status::WrongAnswer,
        Err(err) => {
          warn!("answer of test {} is unreadable: {}", ordinal, err);
          result::Status::InternalError
        }
      },
    },
    status => status,
  };

  let stderr = String::from_utf8_lossy(&res.stderr);
  return result::TestRecord {
    test: ordinal,
    status,
    time: res.time,
    memory: res.memory,
    stdout: match status {
      result::Status::WrongAnswer => {
        Some(result::limit_message(&String::from_utf8_lossy(&res.stdout)))
      }
      _ => None,
    },
    // Judge-side diagnostics stay with the operators; the submitter only
    // sees the generic status.
    stderr: match status {
      result::Status::InternalError => None,
      _ if stderr.is_empty() => None,
      _ => Some(result::limit_message(&stderr)),
    },
  };
}

/// Drive one submission through compilation and the test loop.
///
/// State transitions and per test records are persisted as they happen, so
/// partial diagnostics stay visible even though the loop stops on the first
/// failing test. The returned outcome is terminal.
///
/// # Errors
///
/// This function will return an error only when the storage layer does; the
/// caller converts that into an internal error verdict.
pub async fn judge_submission(
  sandbox: &dyn sandbox::Sandbox,
  storage: &dyn storage::Storage,
  prob: &problem::Problem,
  sub: &submission::Submission,
) -> Result<result::Outcome, error::Error> {
  let source = program::Source {
    lang: sub.lang.clone(),
    code: file::File::Memory(sub.code.clone().into_bytes()),
  };

  if source.lang.compiled() {
    storage
      .set_status(sub.id, result::Status::Compiling)
      .await?;
  }

  let exec = match source.compile(sandbox).await {
    Ok(exec) => exec,
    Err(err) => {
      // A broken sandbox is our failure; a broken program is theirs.
      let status = match err.result.status {
        sandbox::Status::InternalError => result::Status::InternalError,
        _ => result::Status::CompileError,
      };
      debug!("submission {} failed to compile: {}", sub.id, err);
      return Ok(result::Outcome {
        status,
        time: time::Duration::ZERO,
        memory: 0,
        message: match status {
          result::Status::InternalError => None,
          _ => Some(result::limit_message(&err.message)),
        },
      });
    }
  };

  // The validator compiles once; every test reuses the artifact.
  let val = match &prob.validator {
    Some(script) => match script.source.compile(sandbox).await {
      Ok(exec) => Some(validator::Validator {
        exec,
        time_limit: script.time_limit(),
        memory_limit: script.memory_limit(),
      }),
      Err(err) => {
        warn!("validator of problem {} failed to compile: {}", prob.id, err);
        return Ok(result::Outcome {
          status: result::Status::InternalError,
          time: time::Duration::ZERO,
          memory: 0,
          message: None,
        });
      }
    },
    None => None,
  };

  storage.set_status(sub.id, result::Status::Judging).await?;

  let mut status = result::Status::Accepted;
  let mut time = time::Duration::ZERO;
  let mut memory = 0;
  for (ordinal, test) in prob.tests.iter().enumerate() {
    let record = judge_test(sandbox, prob, &exec, val.as_ref(), ordinal, test).await;

    time = time.max(record.time);
    memory = memory.max(record.memory);
    let record_status = record.status;
    storage.append_record(sub.id, record).await?;

    if record_status != result::Status::Accepted {
      // First failure wins; the remaining tests never run.
      status = record_status;
      break;
    }
  }

  return Ok(result::Outcome {
    status,
    time,
    memory,
    message: None,
  });
}
