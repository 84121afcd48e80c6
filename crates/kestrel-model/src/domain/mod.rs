mod kv;
pub use kv::KeyValue;

mod env;
pub use env::Env;

mod command;
pub use command::Command;

mod task_id;
pub use task_id::TaskId;

mod task_state;
pub use task_state::{ExitOutcome, TaskState};

/// Exit code reported for a process terminated by `signal`, following the shell convention.
#[inline]
pub const fn signal_exit_code(signal: i32) -> i32 {
    128 + signal
}
