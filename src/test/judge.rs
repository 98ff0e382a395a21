use std::{
  str::FromStr,
  sync::atomic::{AtomicUsize, Ordering},
  sync::Arc,
  time,
};

use crate::{
  judge, lang, problem, program, result, sandbox,
  storage::{MemStorage, Storage},
  submission, test,
  test::stub,
};

fn aplusb(tests: Vec<(&str, &str)>) -> problem::Problem {
  problem::Problem {
    id: "aplusb".to_string(),
    time_limit: time::Duration::from_secs(1),
    memory_limit: 64 * 1024 * 1024,
    allowed_langs: vec![
      lang::Lang::from_str("python").unwrap(),
      lang::Lang::from_str("cpp").unwrap(),
    ],
    tests: tests
      .into_iter()
      .map(|(input, answer)| problem::Test {
        input: input.into(),
        answer: answer.into(),
      })
      .collect(),
    validator: None,
    generator: None,
    submission_cooldown: None,
    generator_cooldown: None,
  }
}

fn with_validator(mut prob: problem::Problem) -> problem::Problem {
  prob.validator = Some(problem::Script {
    source: program::Source {
      lang: lang::Lang::from_str("python").unwrap(),
      code: "import sys; sys.exit(0)".into(),
    },
    time_limit: Some(time::Duration::from_secs(5)),
    memory_limit: Some(256 * 1024 * 1024),
  });
  prob
}

async fn judge_with(
  sandbox: &dyn sandbox::Sandbox,
  prob: &problem::Problem,
  lang: &str,
  code: &str,
) -> (result::Outcome, submission::Submission) {
  let storage = MemStorage::new();
  let sub = submission::Submission::new(
    "alice",
    &prob.id,
    lang::Lang::from_str(lang).unwrap(),
    code.to_string(),
  );
  storage.create(sub.clone()).await.unwrap();

  let outcome = judge::judge_submission(sandbox, &storage, prob, &sub)
    .await
    .unwrap();
  let stored = storage.get(sub.id).await.unwrap();
  (outcome, stored)
}

#[tokio::test]
async fn test_all_tests_pass() {
  test::init();

  let prob = aplusb(vec![("1\n", "1\n"), ("2\n", "2\n"), ("3\n", "3\n")]);
  let sandbox = stub::StubSandbox::new(|cmd| {
    stub::ok(&String::from_utf8(stub::stdin_of(&cmd)).unwrap())
  });

  let (outcome, stored) = judge_with(sandbox.as_ref(), &prob, "python", "print(input())").await;

  assert_eq!(outcome.status, result::Status::Accepted);
  assert_eq!(stored.records.len(), 3);
  assert!(stored
    .records
    .iter()
    .all(|r| r.status == result::Status::Accepted));
}

#[tokio::test]
async fn test_first_failure_wins_and_partial_records_survive() {
  test::init();

  let prob = aplusb(vec![("1\n", "1\n"), ("2\n", "2\n"), ("3\n", "3\n")]);
  // The program answers the second test wrong; the third must never run.
  let sandbox = stub::StubSandbox::new(|cmd| match stub::stdin_of(&cmd).as_slice() {
    b"2\n" => stub::ok("0\n"),
    input => stub::ok(&String::from_utf8_lossy(input)),
  });

  let (outcome, stored) = judge_with(sandbox.as_ref(), &prob, "python", "solve()").await;

  assert_eq!(outcome.status, result::Status::WrongAnswer);
  assert_eq!(stored.records.len(), 2);
  assert_eq!(stored.records[0].status, result::Status::Accepted);
  assert_eq!(stored.records[1].status, result::Status::WrongAnswer);
  assert_eq!(stored.records[1].test, 1);
}

#[tokio::test]
async fn test_time_limit_beats_matching_partial_output() {
  test::init();

  let prob = aplusb(vec![("1\n", "1\n"), ("2\n", "2\n")]);
  let sandbox = stub::StubSandbox::new(|cmd| match stub::stdin_of(&cmd).as_slice() {
    b"2\n" => {
      // The run printed the right answer before the limit fired; the
      // verdict must still be the limit.
      let mut res = stub::failed(sandbox::Status::TimeLimitExceeded, -1, "");
      res.stdout = b"2\n".to_vec();
      res
    }
    input => stub::ok(&String::from_utf8_lossy(input)),
  });

  let (outcome, _) = judge_with(sandbox.as_ref(), &prob, "python", "solve()").await;
  assert_eq!(outcome.status, result::Status::TimeLimitExceeded);
}

#[tokio::test]
async fn test_fork_bomb_is_a_runtime_error() {
  test::init();

  let prob = aplusb(vec![("1\n", "1\n")]);
  let sandbox = stub::StubSandbox::new(|_| {
    stub::failed(sandbox::Status::ProcessLimitExceeded, -1, "")
  });

  let (outcome, _) = judge_with(sandbox.as_ref(), &prob, "python", "bomb()").await;
  assert_eq!(outcome.status, result::Status::RuntimeError);
}

#[tokio::test]
async fn test_validator_exit_zero_forces_accepted() {
  test::init();

  let prob = with_validator(aplusb(vec![("1\n", "1\n")]));
  let sandbox = stub::StubSandbox::new(|cmd| {
    if stub::is_validator_run(&cmd) {
      stub::ok("")
    } else {
      // Raw output disagrees with the stored answer.
      stub::ok("something else entirely\n")
    }
  });

  let (outcome, _) = judge_with(sandbox.as_ref(), &prob, "python", "solve()").await;
  assert_eq!(outcome.status, result::Status::Accepted);
}

#[tokio::test]
async fn test_validator_nonzero_forces_wrong_answer() {
  test::init();

  let prob = with_validator(aplusb(vec![("1\n", "1\n")]));
  let sandbox = stub::StubSandbox::new(|cmd| {
    if stub::is_validator_run(&cmd) {
      stub::failed(sandbox::Status::NonZeroExitStatus, 1, "")
    } else {
      // Byte for byte the stored answer, overruled by the validator.
      stub::ok("1\n")
    }
  });

  let (outcome, _) = judge_with(sandbox.as_ref(), &prob, "python", "solve()").await;
  assert_eq!(outcome.status, result::Status::WrongAnswer);
}

#[tokio::test]
async fn test_crashing_validator_is_an_internal_error() {
  test::init();

  let prob = with_validator(aplusb(vec![("1\n", "1\n")]));
  let sandbox = stub::StubSandbox::new(|cmd| {
    if stub::is_validator_run(&cmd) {
      stub::failed(sandbox::Status::Signalled, -1, "")
    } else {
      stub::ok("1\n")
    }
  });

  let (outcome, _) = judge_with(sandbox.as_ref(), &prob, "python", "solve()").await;
  assert_eq!(outcome.status, result::Status::InternalError);
}

#[tokio::test]
async fn test_compile_error_short_circuits_all_tests() {
  test::init();

  let prob = aplusb(vec![("1\n", "1\n"), ("2\n", "2\n")]);
  let runs = Arc::new(AtomicUsize::new(0));
  let run_counter = runs.clone();
  let sandbox = stub::StubSandbox::new(move |cmd| {
    if cmd.args[0].contains("g++") {
      stub::failed(
        sandbox::Status::NonZeroExitStatus,
        1,
        "main.cpp:1:1: error: expected declaration",
      )
    } else {
      run_counter.fetch_add(1, Ordering::SeqCst);
      stub::ok("")
    }
  });

  let (outcome, stored) = judge_with(sandbox.as_ref(), &prob, "cpp", "int main( {").await;

  assert_eq!(outcome.status, result::Status::CompileError);
  assert!(outcome.message.unwrap().contains("expected declaration"));
  assert!(stored.records.is_empty());
  assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_artifact_is_compiled_once_and_reused() {
  test::init();

  let prob = aplusb(vec![("1\n", "1\n"), ("2\n", "2\n"), ("3\n", "3\n")]);
  let compiles = Arc::new(AtomicUsize::new(0));
  let compile_counter = compiles.clone();
  let sandbox = stub::StubSandbox::new(move |cmd| {
    if cmd.args[0].contains("g++") {
      compile_counter.fetch_add(1, Ordering::SeqCst);
      let mut res = stub::ok("");
      res.files.insert("main".to_string(), b"\x7fELF".to_vec());
      return res;
    }
    stub::ok(&String::from_utf8_lossy(&stub::stdin_of(&cmd)))
  });

  let (outcome, stored) = judge_with(sandbox.as_ref(), &prob, "cpp", "int main() {}").await;

  assert_eq!(outcome.status, result::Status::Accepted);
  assert_eq!(stored.records.len(), 3);
  assert_eq!(compiles.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_usage_peaks_are_maxima_not_sums() {
  test::init();

  let prob = aplusb(vec![("1\n", "1\n"), ("2\n", "2\n"), ("3\n", "3\n")]);
  let sandbox = stub::StubSandbox::new(|cmd| match stub::stdin_of(&cmd).as_slice() {
    b"1\n" => stub::ok_with("1\n", time::Duration::from_millis(50), 10 * 1024 * 1024),
    b"2\n" => stub::ok_with("2\n", time::Duration::from_millis(200), 5 * 1024 * 1024),
    _ => stub::ok_with("3\n", time::Duration::from_millis(80), 30 * 1024 * 1024),
  });

  let (outcome, _) = judge_with(sandbox.as_ref(), &prob, "python", "solve()").await;

  assert_eq!(outcome.status, result::Status::Accepted);
  assert_eq!(outcome.time, time::Duration::from_millis(200));
  assert_eq!(outcome.memory, 30 * 1024 * 1024);
}

#[tokio::test]
async fn test_sandbox_failure_is_internal_never_blamed_on_the_program() {
  test::init();

  let prob = aplusb(vec![("1\n", "1\n")]);
  let sandbox = stub::StubSandbox::new(|_| {
    sandbox::ExecuteResult::internal_error("sandbox setup failed: missing isolation capability")
  });

  let (outcome, _) = judge_with(sandbox.as_ref(), &prob, "python", "solve()").await;
  assert_eq!(outcome.status, result::Status::InternalError);
}
