//! Execution on another host over SSH.
//!
//! Each task gets its own SSH session. The remote login shell reports its pid (the session's
//! process group, as sshd runs every session under `setsid`) and then execs the decorated line,
//! so the whole remote process tree can later be signalled as one group.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::debug;

use kestrel_model::{Command, TaskId};

use crate::output::OutputDir;
use crate::{Decorators, ExecError, ExecResult, Executor, TaskHandle, state};

mod config;
pub use config::{ClientConfig, Credential, HostKeyPolicy, SshConfig};

mod handle;
pub use handle::RemoteHandle;

mod session;

#[derive(Debug, Clone)]
pub struct RemoteExecutor {
    config: Arc<SshConfig>,
    decorators: Decorators,
}

impl RemoteExecutor {
    pub fn new(config: SshConfig, decorators: Decorators) -> Self {
        Self {
            config: Arc::new(config),
            decorators,
        }
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }
}

#[async_trait]
impl Executor for RemoteExecutor {
    fn name(&self) -> &str {
        "remote"
    }

    async fn execute(&self, command: Command) -> ExecResult<Box<dyn TaskHandle>> {
        let command = self.decorators.decorate(command);
        if command.is_empty() {
            return Err(ExecError::Startup("empty command line".into()));
        }
        let script = session::task_script(&command)?;

        let id = TaskId::random();
        let output = OutputDir::create(self.config.output_dir.as_deref(), self.name(), &id)
            .map_err(|e| ExecError::Startup(format!("output directory: {e}")))?;
        let stdout = match output.create_stdout() {
            Ok(file) => file,
            Err(e) => {
                let _ = output.remove();
                return Err(ExecError::Startup(format!("stdout capture: {e}")));
            }
        };

        let (tx, rx) = state::channel();
        let (started_tx, started_rx) = oneshot::channel();
        let config = Arc::clone(&self.config);
        tokio::task::spawn_blocking(move || {
            session::run(&config, &script, stdout, started_tx, tx);
        });

        let started = started_rx
            .await
            .unwrap_or_else(|_| Err(ExecError::Startup("ssh worker exited".into())));
        let pgid = match started {
            Ok(pgid) => pgid,
            Err(e) => {
                let _ = output.remove();
                return Err(e);
            }
        };

        debug!(
            target: "kestrel.exec.remote",
            id = %id,
            host = %self.config.host,
            pgid,
            line = %command,
            "task started"
        );

        Ok(Box::new(RemoteHandle::new(
            id,
            command,
            pgid,
            rx,
            output,
            Arc::clone(&self.config),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn unreachable() -> SshConfig {
        // TEST-NET-1 is guaranteed unroutable.
        SshConfig::new(ClientConfig::with_agent("bench"), "192.0.2.1", 22)
            .with_connect_timeout(std::time::Duration::from_millis(200))
    }

    #[tokio::test]
    async fn unreachable_host_is_a_startup_error() {
        let executor = RemoteExecutor::new(unreachable(), Decorators::new());
        let err = executor.execute(Command::new("true")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Startup);
    }

    #[tokio::test]
    async fn empty_command_never_connects() {
        let executor = RemoteExecutor::new(unreachable(), Decorators::new());
        let err = executor.execute(Command::new("")).await.unwrap_err();
        assert!(matches!(err, ExecError::Startup(msg) if msg == "empty command line"));
    }
}
