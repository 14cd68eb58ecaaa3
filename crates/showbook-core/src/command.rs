//! Descriptions of external processes: fetch stages, the login flow and the
//! booking executor are all launched from a `CommandSpec`.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
  pub program: String,
  #[serde(default)]
  pub args:    Vec<String>,
  #[serde(default)]
  pub env:     Vec<(String, String)>,
  /// Upper bound on the process lifetime; `None` means unbounded.
  #[serde(default)]
  pub timeout: Option<Duration>,
}

impl CommandSpec {
  pub fn new(program: impl Into<String>) -> Self {
    Self { program: program.into(), args: vec![], env: vec![], timeout: None }
  }

  /// Build from an argv-style list, e.g. `["node", "login.js"]`.
  /// Returns `None` for an empty list.
  pub fn from_argv(argv: &[String]) -> Option<Self> {
    let (program, args) = argv.split_first()?;
    Some(Self::new(program.clone()).args(args.iter().cloned()))
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.push((key.into(), value.into()));
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }
}

impl fmt::Display for CommandSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.program)?;
    for arg in &self.args {
      write!(f, " {arg}")?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_argv_splits_program() {
    let spec = CommandSpec::from_argv(&["node".into(), "login.js".into()]).unwrap();
    assert_eq!(spec.program, "node");
    assert_eq!(spec.args, vec!["login.js".to_string()]);
    assert_eq!(spec.to_string(), "node login.js");
    assert!(CommandSpec::from_argv(&[]).is_none());
  }
}
