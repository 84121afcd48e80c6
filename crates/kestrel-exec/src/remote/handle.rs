use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use kestrel_model::{Command, ExitOutcome, TaskId, TaskState};

use super::{SshConfig, session};
use crate::output::OutputDir;
use crate::state::StateRx;
use crate::{ExecError, ExecResult, TaskHandle};

/// Handle to a task started by [`RemoteExecutor`](super::RemoteExecutor).
///
/// The task's output arrives on the session that started it; `stop` signals the remote process
/// group over a second session.
#[derive(Debug)]
pub struct RemoteHandle {
    id: TaskId,
    command: Command,
    pgid: i32,
    state: StateRx,
    output: OutputDir,
    config: Arc<SshConfig>,
    stopping: Mutex<()>,
    // Set once the remote group has been seen gone; later stops never signal the pgid again.
    group_gone: AtomicBool,
}

impl RemoteHandle {
    pub(super) fn new(
        id: TaskId,
        command: Command,
        pgid: i32,
        state: StateRx,
        output: OutputDir,
        config: Arc<SshConfig>,
    ) -> Self {
        Self {
            id,
            command,
            pgid,
            state,
            output,
            config,
            stopping: Mutex::new(()),
            group_gone: AtomicBool::new(false),
        }
    }

    /// Process group of the task on the remote host.
    pub fn pgid(&self) -> i32 {
        self.pgid
    }

    async fn stop_group(&self) -> ExecResult<bool> {
        let config = Arc::clone(&self.config);
        let pgid = self.pgid;
        let policy = self.config.stop;
        let gone = tokio::task::spawn_blocking(move || session::stop_group(&config, pgid, &policy))
            .await
            .map_err(|e| ExecError::Runtime(format!("stop worker: {e}")))??;
        if gone {
            self.group_gone.store(true, Ordering::Release);
        }
        Ok(gone)
    }
}

#[async_trait]
impl TaskHandle for RemoteHandle {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn address(&self) -> &str {
        &self.config.host
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
        if self.group_gone.load(Ordering::Acquire) {
            return Ok(());
        }

        let policy = self.config.stop;
        match self.status() {
            TaskState::Terminated(ExitOutcome::Exited(_)) => Ok(()),
            // The session died without an exit status; the remote group may still be running.
            TaskState::Terminated(ExitOutcome::Failed(reason)) => {
                debug!(
                    target: "kestrel.exec.remote",
                    id = %self.id,
                    host = %self.config.host,
                    %reason,
                    "session lost, stopping remote group"
                );
                match self.stop_group().await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(ExecError::Runtime(format!(
                        "task {} lost its session ({reason}) and group {} survived SIGKILL",
                        self.id, self.pgid
                    ))),
                    Err(e) => Err(ExecError::Runtime(format!(
                        "task {} lost its session ({reason}) and group {} could not be stopped: {e}",
                        self.id, self.pgid
                    ))),
                }
            }
            TaskState::Running => {
                let gone = self.stop_group().await?;

                // With the group gone the task session closes and publishes the exit status.
                if gone && self.state.wait(Some(policy.kill_timeout)).await {
                    debug!(target: "kestrel.exec.remote", id = %self.id, host = %self.config.host, "task stopped");
                    return Ok(());
                }

                Err(ExecError::StopTimeout {
                    id: self.id.clone(),
                    waited: policy.budget(),
                })
            }
        }
    }

    fn stdout_path(&self) -> Option<&Path> {
        Some(self.output.stdout())
    }

    /// Remote stderr is merged into stdout.
    fn stderr_path(&self) -> Option<&Path> {
        None
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
    use super::*;
    use crate::remote::ClientConfig;
    use crate::{ErrorKind, state};

    fn handle(outcome: ExitOutcome) -> RemoteHandle {
        // TEST-NET-1 is guaranteed unroutable.
        let config = SshConfig::new(ClientConfig::with_agent("bench"), "192.0.2.1", 22)
            .with_connect_timeout(Duration::from_millis(200));
        let id = TaskId::random();
        let output = OutputDir::create(None, "remote", &id).unwrap();
        let (tx, rx) = state::channel();
        tx.terminate(TaskState::Terminated(outcome));

        RemoteHandle::new(id, Command::new("sleep 30"), 4242, rx, output, Arc::new(config))
    }

    #[tokio::test]
    async fn stop_after_exit_does_not_connect() {
        let task = handle(ExitOutcome::Exited(0));
        task.stop().await.unwrap();
        task.clean().unwrap();
    }

    #[tokio::test]
    async fn stop_after_lost_session_reaches_for_the_host() {
        let task = handle(ExitOutcome::Failed("connection reset".into()));

        let err = task.stop().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert!(err.to_string().contains("connection reset"));

        // Still unconfirmed, so a retry tries the host again instead of reporting success.
        assert!(task.stop().await.is_err());
        task.clean().unwrap();
    }
}
