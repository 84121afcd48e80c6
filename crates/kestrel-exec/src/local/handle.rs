use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::Signal;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use kestrel_model::{Command, TaskId, TaskState};

use crate::output::OutputDir;
use crate::state::StateRx;
use crate::utils::signal;
use crate::{ExecError, ExecResult, StopPolicy, TaskHandle};

/// Handle to a task started by [`LocalExecutor`](super::LocalExecutor).
#[derive(Debug)]
pub struct LocalHandle {
    id: TaskId,
    command: Command,
    pgid: i32,
    state: StateRx,
    output: OutputDir,
    policy: StopPolicy,
    // Serializes concurrent `stop` calls so only one escalation runs.
    stopping: Mutex<()>,
    // Latched on the first confirmed teardown. The pgid may be reused afterwards.
    gone: AtomicBool,
}

impl LocalHandle {
    pub(super) fn new(
        id: TaskId,
        command: Command,
        pgid: i32,
        state: StateRx,
        output: OutputDir,
        policy: StopPolicy,
    ) -> Self {
        Self {
            id,
            command,
            pgid,
            state,
            output,
            policy,
            stopping: Mutex::new(()),
            gone: AtomicBool::new(false),
        }
    }

    /// Process group of the task; equal to the pid of its shell.
    pub fn pgid(&self) -> i32 {
        self.pgid
    }

    fn torn_down(&self) -> bool {
        if self.gone.load(Ordering::Acquire) {
            return true;
        }
        let gone = self.state.current().is_terminal() && !signal::group_alive(self.pgid);
        if gone {
            self.gone.store(true, Ordering::Release);
        }
        gone
    }

    fn signal(&self, sig: Signal) -> ExecResult<()> {
        signal::signal_group(self.pgid, sig)
            .map_err(|e| ExecError::Runtime(format!("{sig} to group {}: {e}", self.pgid)))
    }

    /// Poll until the leader is reaped and the group is empty, or `limit` passes.
    async fn await_teardown(&self, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        loop {
            if self.torn_down() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.policy.poll_interval).await;
        }
    }
}

#[async_trait]
impl TaskHandle for LocalHandle {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn address(&self) -> &str {
        "127.0.0.1"
    }

    fn command(&self) -> &Command {
        &self.command
    }

    fn status(&self) -> TaskState {
        self.state.current()
    }

    async fn wait(&self, timeout: Option<Duration>) -> bool {
        self.state.wait(timeout).await
    }

    async fn stop(&self) -> ExecResult<()> {
        let _guard = self.stopping.lock().await;
        if self.torn_down() {
            return Ok(());
        }

        debug!(target: "kestrel.exec.local", id = %self.id, pgid = self.pgid, "sending SIGTERM");
        self.signal(Signal::SIGTERM)?;
        if self.await_teardown(self.policy.grace).await {
            return Ok(());
        }

        debug!(
            target: "kestrel.exec.local",
            id = %self.id,
            pgid = self.pgid,
            grace = ?self.policy.grace,
            "grace period expired, sending SIGKILL"
        );
        self.signal(Signal::SIGKILL)?;
        if self.await_teardown(self.policy.kill_timeout).await {
            return Ok(());
        }

        Err(ExecError::StopTimeout {
            id: self.id.clone(),
            waited: self.policy.budget(),
        })
    }

    fn stdout_path(&self) -> Option<&Path> {
        Some(self.output.stdout())
    }

    fn stderr_path(&self) -> Option<&Path> {
        Some(self.output.stderr())
    }

    fn clean(&self) -> ExecResult<()> {
        if self.is_running() {
            return Err(ExecError::State(format!(
                "task {} is still running; stop it before cleaning",
                self.id
            )));
        }
        self.output.remove().map_err(ExecError::from)
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::process::CommandExt;

    use super::*;
    use kestrel_model::ExitOutcome;

    use crate::state;

    fn terminated_handle(pgid: i32) -> LocalHandle {
        let id = TaskId::random();
        let output = OutputDir::create(None, "local", &id).unwrap();
        let (tx, rx) = state::channel();
        tx.terminate(TaskState::Terminated(ExitOutcome::Exited(0)));
        LocalHandle::new(id, Command::new("true"), pgid, rx, output, StopPolicy::default())
    }

    #[tokio::test]
    async fn confirmed_teardown_is_latched() {
        let mut reaped = std::process::Command::new("true")
            .process_group(0)
            .spawn()
            .unwrap();
        let pgid = reaped.id() as i32;
        reaped.wait().unwrap();

        let task = terminated_handle(pgid);
        task.stop().await.unwrap();
        assert!(task.gone.load(Ordering::Acquire));
        task.clean().unwrap();
    }

    #[tokio::test]
    async fn stop_after_teardown_leaves_a_reused_group_alone() {
        // A later group that happens to own the old pgid.
        let mut newcomer = std::process::Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();
        let task = terminated_handle(newcomer.id() as i32);
        task.gone.store(true, Ordering::Release);

        task.stop().await.unwrap();
        assert!(newcomer.try_wait().unwrap().is_none());

        newcomer.kill().unwrap();
        newcomer.wait().unwrap();
        task.clean().unwrap();
    }
}
