use kestrel_model::Command;

use crate::utils::shell;
use crate::{Decorator, ExecError, ExecResult};

/// Start the command inside an existing control group with `cgexec` (libcgroup).
#[derive(Debug, Clone)]
pub struct CgroupExec {
    controllers: Vec<String>,
    path: String,
}

impl CgroupExec {
    /// `controllers` such as `cpu`, `cpuset`, `memory`; `path` relative to each hierarchy root.
    pub fn new<I, S>(controllers: I, path: impl Into<String>) -> ExecResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let controllers: Vec<String> = controllers.into_iter().map(Into::into).collect();
        let path = path.into();

        if controllers.is_empty() || controllers.iter().any(|c| c.trim().is_empty()) {
            return Err(ExecError::InvalidDecorator(
                "cgexec needs at least one non-empty controller".into(),
            ));
        }
        if path.trim().is_empty() {
            return Err(ExecError::InvalidDecorator("cgexec needs a cgroup path".into()));
        }

        Ok(Self { controllers, path })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Decorator for CgroupExec {
    fn name(&self) -> &'static str {
        "cgroup"
    }

    fn decorate(&self, command: Command) -> Command {
        let group = format!("{}:{}", self.controllers.join(","), self.path);
        let prefix = format!("cgexec -g {}", shell::quote(&group));
        command.map_line(|line| shell::wrap(&prefix, &line))
    }
}
