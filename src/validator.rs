use std::time;

use crate::{file, program, result, sandbox};

/// Names under which the judged files are staged for the validator.
const INPUT_NAME: &str = "input.txt";
const OUTPUT_NAME: &str = "user.out";
const ANSWER_NAME: &str = "expected.out";

/// Validator is a type of executable program which decides the correctness
/// of the user's output on a given input, used when a problem admits more
/// than one correct answer.
///
/// A validator is untrusted code and runs under the same sandbox as the
/// submissions it judges, with its own limits.
#[derive(Debug, Clone)]
pub struct Validator {
  pub exec: program::Executable,

  /// CPU time limit of one validator run.
  pub time_limit: time::Duration,

  /// Memory limit of one validator run, in bytes.
  pub memory_limit: u64,
}

impl Validator {
  /// Run the validator on one judged test.
  ///
  /// The validator receives exactly three positional arguments: the input
  /// file path, the user's output file path and the expected output file
  /// path. Exit code 0 means accepted and any other exit code means wrong
  /// answer, even when the raw outputs would say otherwise. A validator
  /// that itself crashes, times out or cannot be sandboxed is an internal
  /// judge failure, never blamed on the submitter.
  pub async fn validate(
    &self,
    sandbox: &dyn sandbox::Sandbox,
    input: file::File,
    output: Vec<u8>,
    answer: file::File,
  ) -> result::Status {
    let res = sandbox
      .run(sandbox::Cmd {
        args: [
          self.exec.run_cmd(),
          [INPUT_NAME, OUTPUT_NAME, ANSWER_NAME]
            .iter()
            .map(|&s| s.into())
            .collect(),
        ]
        .concat(),
        copy_in: [
          (
            self.exec.file_name(),
            file::File::Path(self.exec.path().to_path_buf()),
          ),
          (INPUT_NAME.to_string(), input),
          (OUTPUT_NAME.to_string(), file::File::Memory(output)),
          (ANSWER_NAME.to_string(), answer),
        ]
        .into(),
        time_limit: self.time_limit,
        memory_limit: self.memory_limit,
        ..Default::default()
      })
      .await;

    return match res.status {
      sandbox::Status::Accepted => result::Status::Accepted,
      sandbox::Status::NonZeroExitStatus => result::Status::WrongAnswer,
      _ => result::Status::InternalError,
    };
  }
}
