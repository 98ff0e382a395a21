use crate::checker;

#[test]
fn test_whitespace_runs_and_case_fold() {
  assert!(checker::check("Hello,  World\n".as_bytes(), "hello, world".as_bytes()));
}

#[test]
fn test_content_difference_is_not_smoothed_over() {
  assert!(!checker::check("Hello World".as_bytes(), "Hello, World".as_bytes()));
}

#[test]
fn test_trailing_whitespace_is_trimmed() {
  assert!(checker::check("  42\n\n".as_bytes(), "42".as_bytes()));
}

#[test]
fn test_newlines_collapse_like_spaces() {
  assert!(checker::check("1 2\n3".as_bytes(), "1   2\n3\n".as_bytes()));
}

#[test]
fn test_different_numbers_differ() {
  assert!(!checker::check("5\n".as_bytes(), "6\n".as_bytes()));
}

#[test]
fn test_empty_outputs_match() {
  assert!(checker::check("".as_bytes(), "\n".as_bytes()));
}
