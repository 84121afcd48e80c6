use std::collections::BTreeSet;

use kestrel_model::Command;
use kestrel_topo::ThreadSet;

use crate::utils::shell;
use crate::{Decorator, ExecError, ExecResult};

/// Bind CPU and memory placement with `numactl`.
#[derive(Debug, Clone, Default)]
pub struct Numactl {
    physcpubind: Option<String>,
    membind: Option<String>,
    preferred: Option<u32>,
}

impl Numactl {
    pub fn builder() -> NumactlBuilder {
        NumactlBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NumactlBuilder {
    threads: Option<ThreadSet>,
    membind: Vec<u32>,
    preferred: Option<u32>,
}

impl NumactlBuilder {
    pub fn physcpubind(mut self, threads: &ThreadSet) -> Self {
        self.threads = Some(threads.clone());
        self
    }

    pub fn membind<I: IntoIterator<Item = u32>>(mut self, nodes: I) -> Self {
        self.membind = nodes.into_iter().collect();
        self
    }

    pub fn preferred(mut self, node: u32) -> Self {
        self.preferred = Some(node);
        self
    }

    pub fn build(self) -> ExecResult<Numactl> {
        if self.threads.as_ref().is_some_and(ThreadSet::is_empty) {
            return Err(ExecError::InvalidDecorator(
                "numactl physcpubind needs at least one hardware thread".into(),
            ));
        }
        if !self.membind.is_empty() && self.preferred.is_some() {
            return Err(ExecError::InvalidDecorator(
                "numactl membind and preferred are mutually exclusive".into(),
            ));
        }

        let numactl = Numactl {
            physcpubind: self.threads.map(|t| t.to_cpulist()),
            membind: (!self.membind.is_empty())
                .then(|| cpulist::emit(self.membind.iter().copied().collect::<BTreeSet<_>>())),
            preferred: self.preferred,
        };
        if numactl.physcpubind.is_none() && numactl.membind.is_none() && numactl.preferred.is_none()
        {
            return Err(ExecError::InvalidDecorator(
                "numactl decorator without any policy".into(),
            ));
        }
        Ok(numactl)
    }
}

impl Decorator for Numactl {
    fn name(&self) -> &'static str {
        "numactl"
    }

    fn decorate(&self, command: Command) -> Command {
        let mut prefix = String::from("numactl");
        if let Some(cpus) = &self.physcpubind {
            prefix.push_str(&format!(" --physcpubind={cpus}"));
        }
        if let Some(nodes) = &self.membind {
            prefix.push_str(&format!(" --membind={nodes}"));
        }
        if let Some(node) = self.preferred {
            prefix.push_str(&format!(" --preferred={node}"));
        }
        command.map_line(|line| shell::wrap(&prefix, &line))
    }
}
