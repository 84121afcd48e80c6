use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use kestrel_model::{Command, ExitOutcome, TaskId, TaskState};

use crate::error::{ExecError, ExecResult};

/// An execution strategy: where and how a command runs.
///
/// `execute` fails only when the command cannot be started. Everything that happens afterwards
/// is observed through the returned [`TaskHandle`].
#[async_trait]
pub trait Executor: Send + Sync + fmt::Debug {
    /// Short label used in logs and output directory names.
    fn name(&self) -> &str;

    /// Decorate and start `command`, returning once the process is running.
    async fn execute(&self, command: Command) -> ExecResult<Box<dyn TaskHandle>>;
}

/// Lifecycle handle for one launched process tree.
///
/// State moves `Running -> Terminated` exactly once. Every method takes `&self`; handles may be
/// shared between tasks behind an `Arc`.
#[async_trait]
pub trait TaskHandle: Send + Sync + fmt::Debug {
    fn id(&self) -> &TaskId;

    /// Address of the host the task runs on.
    fn address(&self) -> &str;

    /// The command as it was actually started, decorators applied.
    fn command(&self) -> &Command;

    fn status(&self) -> TaskState;

    fn is_running(&self) -> bool {
        self.status().is_running()
    }

    /// Wait for termination. Returns `true` once terminated, `false` if `timeout` elapsed first.
    /// `None` waits indefinitely.
    async fn wait(&self, timeout: Option<Duration>) -> bool;

    /// Terminate the task and everything it spawned, returning once termination is confirmed.
    ///
    /// Stopping a terminated task is a no-op.
    async fn stop(&self) -> ExecResult<()>;

    /// Exit code of the terminated task. Non-blocking: fails with [`ExecError::State`] while the
    /// task is still running.
    fn exit_code(&self) -> ExecResult<i32> {
        exit_code_of(&self.status())
    }

    fn stdout_path(&self) -> Option<&Path>;

    fn stderr_path(&self) -> Option<&Path>;

    /// Remove the captured output. Fails while the task is running.
    fn clean(&self) -> ExecResult<()>;
}

pub(crate) fn exit_code_of(state: &TaskState) -> ExecResult<i32> {
    match state {
        TaskState::Running => Err(ExecError::State(
            "exit code requested before the task terminated".into(),
        )),
        TaskState::Terminated(ExitOutcome::Exited(code)) => Ok(*code),
        TaskState::Terminated(ExitOutcome::Failed(reason)) => {
            Err(ExecError::Runtime(reason.clone()))
        }
    }
}

/// Stop every handle, attempting all of them even if some fail. Returns the first error.
pub async fn stop_all<H>(handles: &[H]) -> ExecResult<()>
where
    H: AsRef<dyn TaskHandle>,
{
    let mut first = None;
    for handle in handles {
        let handle = handle.as_ref();
        if let Err(e) = handle.stop().await {
            warn!(target: "kestrel.exec", id = %handle.id(), error = %e, "stop failed");
            first.get_or_insert(e);
        }
    }
    first.map_or(Ok(()), Err)
}
