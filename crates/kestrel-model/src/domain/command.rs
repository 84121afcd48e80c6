use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Env;

/// A shell-invocable command line plus the environment overrides it needs.
///
/// The line is handed to `sh -c` locally and to the remote shell for remote execution, so
/// isolation decorators may freely wrap it into longer invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    line: String,
    #[serde(default, skip_serializing_if = "Env::is_empty")]
    env: Env,
}

impl Command {
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            env: Env::new(),
        }
    }

    pub fn with_env<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env.push(key, value);
        self
    }

    #[inline]
    pub fn line(&self) -> &str {
        &self.line
    }

    #[inline]
    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Replace the command line, keeping the environment overrides.
    pub fn map_line<F>(self, f: F) -> Self
    where
        F: FnOnce(String) -> String,
    {
        Self {
            line: f(self.line),
            env: self.env,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.line.trim().is_empty()
    }
}

impl From<&str> for Command {
    fn from(line: &str) -> Self {
        Command::new(line)
    }
}

impl From<String> for Command {
    fn from(line: String) -> Self {
        Command::new(line)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_line_keeps_env() {
        let cmd = Command::new("sleep 1").with_env("A", "1");
        let wrapped = cmd.map_line(|l| format!("nice -n 5 {l}"));

        assert_eq!(wrapped.line(), "nice -n 5 sleep 1");
        assert_eq!(wrapped.env().get("A"), Some("1"));
    }

    #[test]
    fn blank_line_is_empty() {
        assert!(Command::new("  ").is_empty());
        assert!(!Command::from("true").is_empty());
    }
}
