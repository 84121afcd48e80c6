use kestrel_model::Command;
use kestrel_topo::ThreadSet;

use crate::utils::shell;
use crate::{Decorator, ExecError, ExecResult};

/// Pin the command to hardware threads with `taskset -c`.
#[derive(Debug, Clone)]
pub struct Taskset {
    cpulist: String,
}

impl Taskset {
    pub fn new(threads: &ThreadSet) -> ExecResult<Self> {
        if threads.is_empty() {
            return Err(ExecError::InvalidDecorator(
                "taskset needs at least one hardware thread".into(),
            ));
        }
        Ok(Self {
            cpulist: threads.to_cpulist(),
        })
    }

    /// The pinned CPUs in cpulist syntax.
    pub fn cpulist(&self) -> &str {
        &self.cpulist
    }
}

impl Decorator for Taskset {
    fn name(&self) -> &'static str {
        "taskset"
    }

    fn decorate(&self, command: Command) -> Command {
        let prefix = format!("taskset -c {}", self.cpulist);
        command.map_line(|line| shell::wrap(&prefix, &line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_topo::Thread;

    #[test]
    fn pins_to_cpulist() {
        let threads: ThreadSet = (0..4).map(|i| Thread::new(i, i, 0)).collect();
        let cmd = Taskset::new(&threads)
            .unwrap()
            .decorate(Command::new("stress-ng --cpu 4"));

        assert_eq!(cmd.line(), "taskset -c 0-3 stress-ng --cpu 4");
    }

    #[test]
    fn empty_set_is_rejected() {
        assert!(matches!(
            Taskset::new(&ThreadSet::new()),
            Err(ExecError::InvalidDecorator(_))
        ));
    }
}
