use std::{str::FromStr, sync::Arc, time};

use uuid::Uuid;

use crate::{
  error, lang, problem, program, result, service, storage::MemStorage, submission, test,
  test::stub,
};

fn echo_problem(id: &str, cooldown: time::Duration) -> problem::Problem {
  problem::Problem {
    id: id.to_string(),
    time_limit: time::Duration::from_secs(1),
    memory_limit: 64 * 1024 * 1024,
    allowed_langs: vec![lang::Lang::from_str("python").unwrap()],
    tests: vec![
      problem::Test {
        input: "1\n".into(),
        answer: "1\n".into(),
      },
      problem::Test {
        input: "2\n".into(),
        answer: "2\n".into(),
      },
    ],
    validator: None,
    generator: Some(problem::Script {
      source: program::Source {
        lang: lang::Lang::from_str("python").unwrap(),
        code: "print(5)".into(),
      },
      time_limit: None,
      memory_limit: None,
    }),
    submission_cooldown: Some(cooldown),
    generator_cooldown: Some(cooldown),
  }
}

fn echo_service(cooldown: time::Duration) -> service::Service {
  service::Service::start(
    vec![echo_problem("aplusb", cooldown)],
    Arc::new(MemStorage::new()),
    stub::StubSandbox::new(|cmd| {
      let mut res = stub::ok(&String::from_utf8_lossy(&stub::stdin_of(&cmd)));
      res.stderr = b"25\n".to_vec();
      res
    }),
  )
}

async fn wait_terminal(service: &service::Service, id: Uuid) -> submission::Submission {
  for _ in 0..400 {
    let sub = service.status(id).await.unwrap();
    if sub.status.is_terminal() {
      return sub;
    }
    tokio::time::sleep(time::Duration::from_millis(5)).await;
  }
  panic!("submission {} never reached a terminal state", id);
}

#[tokio::test]
async fn test_submit_judge_and_read_back() {
  test::init();

  let service = echo_service(time::Duration::ZERO);
  let id = service
    .submit(
      "alice",
      "aplusb",
      lang::Lang::from_str("python").unwrap(),
      "print(input())".to_string(),
    )
    .await
    .unwrap();

  let judged = wait_terminal(&service, id).await;
  assert_eq!(judged.status, result::Status::Accepted);
  assert_eq!(judged.records.len(), 2);
  assert_eq!(judged.user, "alice");
  assert!(judged.started_at.is_some());
  assert!(judged.finished_at.is_some());

  service.shutdown().await;
}

#[tokio::test]
async fn test_unknown_problem_is_rejected() {
  test::init();

  let service = echo_service(time::Duration::ZERO);
  let res = service
    .submit(
      "alice",
      "ghost",
      lang::Lang::from_str("python").unwrap(),
      "print(42)".to_string(),
    )
    .await;

  assert!(matches!(res, Err(error::Error::ProblemNotFound(_))));
  service.shutdown().await;
}

#[tokio::test]
async fn test_disallowed_language_is_rejected_before_the_queue() {
  test::init();

  let service = echo_service(time::Duration::ZERO);
  let res = service
    .submit(
      "alice",
      "aplusb",
      lang::Lang::from_str("cpp").unwrap(),
      "int main() {}".to_string(),
    )
    .await;

  assert!(matches!(
    res,
    Err(error::Error::UnsupportedLanguage { .. })
  ));
  service.shutdown().await;
}

#[tokio::test]
async fn test_submission_cooldown_rejects_then_admits() {
  test::init();

  let service = echo_service(time::Duration::from_millis(250));
  let code = "print(input())".to_string();
  let lang = lang::Lang::from_str("python").unwrap();

  let first = service
    .submit("alice", "aplusb", lang.clone(), code.clone())
    .await;
  assert!(first.is_ok());

  let second = service
    .submit("alice", "aplusb", lang.clone(), code.clone())
    .await;
  assert!(matches!(second, Err(error::Error::Cooldown { .. })));

  // Another user is not throttled by alice's window.
  assert!(service
    .submit("bob", "aplusb", lang.clone(), code.clone())
    .await
    .is_ok());

  tokio::time::sleep(time::Duration::from_millis(300)).await;
  assert!(service.submit("alice", "aplusb", lang, code).await.is_ok());

  service.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_submissions_are_each_judged_exactly_once() {
  test::init();

  let service = echo_service(time::Duration::ZERO);
  let lang = lang::Lang::from_str("python").unwrap();

  let mut ids = vec![];
  for i in 0..10 {
    let id = service
      .submit(
        &format!("user-{}", i),
        "aplusb",
        lang.clone(),
        "print(input())".to_string(),
      )
      .await
      .unwrap();
    ids.push(id);
  }

  for id in &ids {
    let judged = wait_terminal(&service, *id).await;
    assert_eq!(judged.status, result::Status::Accepted);
    assert_eq!(judged.records.len(), 2);
  }

  // Every submission kept its own identity and record list.
  let mut unique = ids.clone();
  unique.sort();
  unique.dedup();
  assert_eq!(unique.len(), ids.len());

  service.shutdown().await;
}

#[tokio::test]
async fn test_sample_request_uses_the_generator_contract() {
  test::init();

  let service = echo_service(time::Duration::ZERO);
  let sample = service.sample("alice", "aplusb").await.unwrap();

  // The stub echoes nothing on stdout for an empty stdin and always writes
  // 25 on stderr, which the contract maps to input/output respectively.
  assert_eq!(sample.output, b"25\n");

  service.shutdown().await;
}

#[tokio::test]
async fn test_sample_cooldown_is_independent_from_submissions() {
  test::init();

  let service = echo_service(time::Duration::from_millis(250));
  let lang = lang::Lang::from_str("python").unwrap();

  assert!(service.sample("alice", "aplusb").await.is_ok());
  assert!(matches!(
    service.sample("alice", "aplusb").await,
    Err(error::Error::Cooldown { .. })
  ));

  // The generator window does not block a submission.
  assert!(service
    .submit("alice", "aplusb", lang, "print(input())".to_string())
    .await
    .is_ok());

  service.shutdown().await;
}

#[tokio::test]
async fn test_broken_sandbox_surfaces_as_internal_error_verdict() {
  test::init();

  let service = service::Service::start(
    vec![echo_problem("aplusb", time::Duration::ZERO)],
    Arc::new(MemStorage::new()),
    stub::StubSandbox::new(|_| {
      crate::sandbox::ExecuteResult::internal_error("sandbox setup failed")
    }),
  );

  let id = service
    .submit(
      "alice",
      "aplusb",
      lang::Lang::from_str("python").unwrap(),
      "print(input())".to_string(),
    )
    .await
    .unwrap();

  let judged = wait_terminal(&service, id).await;
  assert_eq!(judged.status, result::Status::InternalError);

  service.shutdown().await;
}
