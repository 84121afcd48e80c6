//! Execution on this host.
//!
//! Every task runs as `<shell> -c <line>` in a process group of its own, so `stop` can signal
//! the task together with everything it forked.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, trace};

use kestrel_model::{Command, ExitOutcome, TaskId, TaskState};

use crate::output::OutputDir;
use crate::utils::{RlimitConfig, attach_rlimits, signal};
use crate::{Decorators, ExecError, ExecResult, Executor, StopPolicy, TaskHandle, state};

mod handle;
pub use handle::LocalHandle;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocalConfig {
    pub stop: StopPolicy,
    /// Where per-task output directories are created. Defaults to the system temp dir.
    pub output_dir: Option<PathBuf>,
    pub rlimits: RlimitConfig,
    /// Shell the decorated line is handed to with `-c`.
    pub shell: PathBuf,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            stop: StopPolicy::default(),
            output_dir: None,
            rlimits: RlimitConfig::default(),
            shell: PathBuf::from("/bin/sh"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    decorators: Decorators,
    config: LocalConfig,
}

impl LocalExecutor {
    pub fn new(decorators: Decorators) -> Self {
        Self::with_config(decorators, LocalConfig::default())
    }

    pub fn with_config(decorators: Decorators, config: LocalConfig) -> Self {
        Self { decorators, config }
    }

    pub fn config(&self) -> &LocalConfig {
        &self.config
    }

    pub fn decorators(&self) -> &Decorators {
        &self.decorators
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    fn name(&self) -> &str {
        "local"
    }

    async fn execute(&self, command: Command) -> ExecResult<Box<dyn TaskHandle>> {
        let command = self.decorators.decorate(command);
        if command.is_empty() {
            return Err(ExecError::Startup("empty command line".into()));
        }

        let id = TaskId::random();
        let output = OutputDir::create(self.config.output_dir.as_deref(), self.name(), &id)
            .map_err(|e| ExecError::Startup(format!("output directory: {e}")))?;

        let spawned = spawn(&self.config, &command, &output);
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let _ = output.remove();
                return Err(e);
            }
        };

        // The leader was just spawned and is not yet reaped, so its pid is present.
        let Some(pid) = child.id() else {
            let _ = output.remove();
            return Err(ExecError::Startup("task exited before its pid was read".into()));
        };
        let pgid = pid as i32;

        debug!(
            target: "kestrel.exec.local",
            id = %id,
            pgid,
            line = %command,
            "task started"
        );

        let (tx, rx) = state::channel();
        let reaped = id.clone();
        tokio::spawn(async move {
            let state = match child.wait().await {
                Ok(status) => TaskState::Terminated(ExitOutcome::Exited(signal::exit_code(status))),
                Err(e) => TaskState::Terminated(ExitOutcome::Failed(format!("wait: {e}"))),
            };
            trace!(target: "kestrel.exec.local", id = %reaped, ?state, "task reaped");
            tx.terminate(state);
        });

        Ok(Box::new(LocalHandle::new(
            id,
            command,
            pgid,
            rx,
            output,
            self.config.stop,
        )))
    }
}

fn spawn(
    config: &LocalConfig,
    command: &Command,
    output: &OutputDir,
) -> ExecResult<tokio::process::Child> {
    let stdout = output
        .create_stdout()
        .map_err(|e| ExecError::Startup(format!("stdout capture: {e}")))?;
    let stderr = output
        .create_stderr()
        .map_err(|e| ExecError::Startup(format!("stderr capture: {e}")))?;

    let mut cmd = tokio::process::Command::new(&config.shell);
    cmd.arg("-c")
        .arg(command.line())
        .envs(command.env().iter().map(|kv| (kv.key(), kv.value())))
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .process_group(0);
    attach_rlimits(&mut cmd, &config.rlimits);

    cmd.spawn()
        .map_err(|e| ExecError::Startup(format!("spawn {}: {e}", config.shell.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_bin_sh() {
        let config: LocalConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LocalConfig::default());
        assert_eq!(config.shell, PathBuf::from("/bin/sh"));
    }

    #[test]
    fn config_deserializes_nested_sections() {
        let config: LocalConfig = serde_json::from_str(
            r#"{
                "stop": { "graceMs": 100 },
                "outputDir": "/var/tmp/kestrel",
                "rlimits": { "maxOpenFiles": 1024 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.stop.grace, std::time::Duration::from_millis(100));
        assert_eq!(config.output_dir, Some(PathBuf::from("/var/tmp/kestrel")));
        assert_eq!(config.rlimits.max_open_files, Some(1024));
    }

    #[tokio::test]
    async fn empty_command_is_a_startup_error() {
        let err = LocalExecutor::default()
            .execute(Command::new("   "))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Startup);
    }
}
