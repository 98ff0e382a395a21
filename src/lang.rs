use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::{fmt::Display, hash::Hash, str::FromStr};
use thiserror::Error;

use crate::{etc, CONFIG};

/// Programming language.
#[derive(Debug, SerializeDisplay, DeserializeFromStr, Clone, PartialEq, Eq, Hash)]
pub struct Lang {
  name: String,
}

impl Lang {
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Snapshot of the config entry for this language.
  pub fn cfg(&self) -> etc::LangCfg {
    CONFIG.read().unwrap().lang[&self.name].clone()
  }

  /// Whether the language needs a compile step before running.
  pub fn compiled(&self) -> bool {
    self.cfg().compile_cmd.is_some()
  }
}

impl FromStr for Lang {
  type Err = InvalidLangError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match CONFIG.read().unwrap().lang.get(s) {
      Some(_x) => Ok(Lang {
        name: s.to_string(),
      }),
      None => Err(Self::Err {
        lang: s.to_string(),
      }),
    }
  }
}

impl Display for Lang {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", &self.name)
  }
}

/// Error when parsing a language name which not in global settings.
#[derive(Error, Debug, Clone)]
#[error("invalid lang: {lang}")]
pub struct InvalidLangError {
  pub lang: String,
}
