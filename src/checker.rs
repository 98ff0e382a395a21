use regex::Regex;

/// Default output comparison, used when a problem has no custom validator.
///
/// Two outputs are equivalent when, after trimming both ends and collapsing
/// every internal whitespace run (spaces, tabs, newlines) into one space,
/// they compare equal case-insensitively. `"Hello,  World\n"` therefore
/// matches `"hello, world"`, while `"Hello World"` does not match
/// `"Hello, World"`.
pub fn check(output: &[u8], answer: &[u8]) -> bool {
  normalize(output) == normalize(answer)
}

fn normalize(data: &[u8]) -> String {
  lazy_static! {
    static ref WS_PAT: Regex = Regex::new(r"\s+").unwrap();
  }

  let text = String::from_utf8_lossy(data);
  return WS_PAT.replace_all(text.trim(), " ").to_lowercase();
}
