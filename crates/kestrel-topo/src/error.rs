use thiserror::Error;

use crate::Thread;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopoError {
    #[error("topology discovery failed: {0}")]
    Discovery(String),
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// A placement request that the topology cannot satisfy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("requested {requested} sockets but only {available} are present")]
    InsufficientSockets { requested: usize, available: usize },
    #[error("no threads belong to the requested cores")]
    NoMatchingCores,
    #[error("thread {0} is not part of the topology")]
    ThreadNotFound(Thread),
}

pub type TopoResult<T> = Result<T, TopoError>;
