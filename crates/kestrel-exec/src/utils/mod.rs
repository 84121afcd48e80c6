//! Process plumbing shared by the executors.
pub mod limits;
pub mod shell;
pub mod signal;

pub use limits::{RlimitConfig, attach_rlimits};
