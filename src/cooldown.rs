use std::time;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error;

/// What a cooldown entry throttles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
  Submission,
  Generator,
}

/// Tracks the last accepted request per (user, problem, kind) and rejects
/// anything arriving inside the configured window.
///
/// A rejected request does not refresh the stamp, so retrying early gains a
/// client nothing. The per key entry lock of the map keeps two concurrent
/// requests of the same key from both passing the check.
#[derive(Debug, Default)]
pub struct Guard {
  stamps: DashMap<(String, String, Kind), time::Instant>,
}

impl Guard {
  pub fn new() -> Self {
    Self::default()
  }

  /// Admit or reject a request, charging the window only on admission.
  ///
  /// # Errors
  ///
  /// This function will return a cooldown error carrying the remaining wait
  /// when the last accepted request of the same key is too recent.
  pub fn check(
    &self,
    user: &str,
    problem: &str,
    kind: Kind,
    cooldown: time::Duration,
  ) -> Result<(), error::Error> {
    let now = time::Instant::now();
    match self.stamps.entry((user.to_string(), problem.to_string(), kind)) {
      Entry::Occupied(mut entry) => {
        let elapsed = now.duration_since(*entry.get());
        if elapsed < cooldown {
          return Err(error::Error::Cooldown {
            remaining: cooldown - elapsed,
          });
        }
        entry.insert(now);
        Ok(())
      }
      Entry::Vacant(entry) => {
        entry.insert(now);
        Ok(())
      }
    }
  }
}
