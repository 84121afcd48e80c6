use serde::{Deserialize, Serialize};

/// How a terminated task ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExitOutcome {
    /// The process exited; signal deaths are reported as `128 + signal`.
    Exited(i32),
    /// The process could not be observed to completion (lost connection, wait failure).
    Failed(String),
}

/// Lifecycle state of a task handle.
///
/// The only transition is `Running -> Terminated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    Running,
    Terminated(ExitOutcome),
}

impl TaskState {
    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self, TaskState::Running)
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        !self.is_running()
    }

    /// Exit code, if the task terminated with one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TaskState::Terminated(ExitOutcome::Exited(code)) => Some(*code),
            _ => None,
        }
    }
}
