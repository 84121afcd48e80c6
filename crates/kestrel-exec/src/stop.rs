use std::time::Duration;

use serde::Deserialize;

/// How `stop` tears a process tree down.
///
/// `SIGTERM` goes to the whole process group first; if the group is still alive after `grace`,
/// it gets `SIGKILL` and has `kill_timeout` to disappear before `stop` gives up with
/// [`ExecError::StopTimeout`](crate::ExecError::StopTimeout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StopPolicy {
    #[serde(rename = "graceMs", with = "millis")]
    pub grace: Duration,
    #[serde(rename = "killTimeoutMs", with = "millis")]
    pub kill_timeout: Duration,
    #[serde(rename = "pollIntervalMs", with = "millis")]
    pub poll_interval: Duration,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            kill_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl StopPolicy {
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Upper bound on how long a single `stop` may block.
    pub fn budget(&self) -> Duration {
        self.grace + self.kill_timeout
    }
}

pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
