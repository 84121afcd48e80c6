use std::time::Duration;

use thiserror::Error;

use kestrel_model::TaskId;

#[derive(Error, Debug)]
pub enum ExecError {
    /// The command could not be started; no handle was produced.
    #[error("startup failed: {0}")]
    Startup(String),
    /// The task was running and then could not be observed or controlled.
    #[error("runtime failure: {0}")]
    Runtime(String),
    /// The operation is invalid in the task's current lifecycle state.
    #[error("invalid state: {0}")]
    State(String),
    #[error("task {id} did not terminate within {waited:?}")]
    StopTimeout { id: TaskId, waited: Duration },
    #[error("invalid decorator: {0}")]
    InvalidDecorator(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(String),
}

/// Coarse classification of an [`ExecError`] by when it can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Before a handle exists: spawning, connecting, validating input.
    Startup,
    /// While or after the task runs.
    Runtime,
    /// Misuse of a handle in its current state.
    State,
}

impl ExecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::Startup(_) | ExecError::InvalidDecorator(_) | ExecError::Config(_) => {
                ErrorKind::Startup
            }
            ExecError::Runtime(_) | ExecError::StopTimeout { .. } | ExecError::Io(_) => {
                ErrorKind::Runtime
            }
            ExecError::State(_) => ErrorKind::State,
        }
    }
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}

pub type ExecResult<T> = Result<T, ExecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_lifecycle() {
        assert_eq!(ExecError::Startup("x".into()).kind(), ErrorKind::Startup);
        assert_eq!(ExecError::Config("x".into()).kind(), ErrorKind::Startup);
        assert_eq!(ExecError::Runtime("x".into()).kind(), ErrorKind::Runtime);
        assert_eq!(
            ExecError::StopTimeout {
                id: TaskId::from("t"),
                waited: Duration::from_secs(1)
            }
            .kind(),
            ErrorKind::Runtime
        );
        assert_eq!(ExecError::State("x".into()).kind(), ErrorKind::State);
    }
}
