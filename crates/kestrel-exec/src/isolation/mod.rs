//! Isolation decorators: command rewrites that place a task inside an isolation or placement
//! mechanism before it runs.
//!
//! Decorators close over their parameters at construction and are otherwise stateless, so one
//! chain can be shared by any number of executions.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use kestrel_model::Command;

mod cgroup;
pub use cgroup::CgroupExec;

mod namespace;
pub use namespace::Namespace;

mod nice;
pub use nice::Nice;

mod numactl;
pub use numactl::Numactl;

mod taskset;
pub use taskset::Taskset;

/// One command transformation.
pub trait Decorator: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn decorate(&self, command: Command) -> Command;
}

/// Ordered decorator chain.
///
/// Decorators apply in list order: the first wraps the raw command and the last ends up as the
/// outermost wrapper. `[Taskset, Namespace]` therefore runs a pinned process inside a new
/// namespace.
#[derive(Debug, Clone, Default)]
pub struct Decorators(Vec<Arc<dyn Decorator>>);

impl Decorators {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append `decorator` as the new outermost wrapper.
    pub fn with<D>(mut self, decorator: D) -> Self
    where
        D: Decorator + 'static,
    {
        self.0.push(Arc::new(decorator));
        self
    }

    pub fn push(&mut self, decorator: Arc<dyn Decorator>) {
        self.0.push(decorator);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.0.iter().map(|d| d.name()).collect()
    }

    pub fn decorate(&self, command: Command) -> Command {
        self.0.iter().fold(command, |command, decorator| {
            let decorated = decorator.decorate(command);
            trace!(
                target: "kestrel.exec.isolation",
                decorator = decorator.name(),
                line = %decorated,
                "decorated"
            );
            decorated
        })
    }
}

impl FromIterator<Arc<dyn Decorator>> for Decorators {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Decorator>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
