use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use kestrel_model::Command;

use crate::{ExecResult, Executor, TaskHandle};

/// A named unit of work that knows how to start one workload on an executor.
#[async_trait]
pub trait Launcher: Send + Sync {
    fn name(&self) -> &str;

    async fn launch(&self) -> ExecResult<Box<dyn TaskHandle>>;
}

/// Launches a fixed command on a fixed executor.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    name: String,
    command: Command,
    executor: Arc<dyn Executor>,
}

impl CommandLauncher {
    pub fn new(name: impl Into<String>, command: Command, executor: Arc<dyn Executor>) -> Self {
        Self {
            name: name.into(),
            command,
            executor,
        }
    }
}

#[async_trait]
impl Launcher for CommandLauncher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn launch(&self) -> ExecResult<Box<dyn TaskHandle>> {
        debug!(
            target: "kestrel.exec.launcher",
            launcher = %self.name,
            executor = self.executor.name(),
            "launching"
        );
        self.executor.execute(self.command.clone()).await
    }
}
