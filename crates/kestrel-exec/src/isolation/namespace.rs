use nix::sched::CloneFlags;

use kestrel_model::Command;

use crate::utils::shell;
use crate::{Decorator, ExecError, ExecResult};

/// Run the command in fresh Linux namespaces via `unshare(1)`.
///
/// `--fork` and `--kill-child` are always passed: the command becomes a child of `unshare`, and
/// if `unshare` dies the namespace's first process is killed with it. For a PID namespace that
/// takes the whole namespace down, so stopping the task's process group reliably tears down
/// everything that was started inside, daemons included.
#[derive(Debug, Clone)]
pub struct Namespace {
    flags: CloneFlags,
}

const SUPPORTED: &[(CloneFlags, &str)] = &[
    (CloneFlags::CLONE_NEWPID, "--pid --mount-proc"),
    (CloneFlags::CLONE_NEWNS, "--mount"),
    (CloneFlags::CLONE_NEWNET, "--net"),
    (CloneFlags::CLONE_NEWIPC, "--ipc"),
    (CloneFlags::CLONE_NEWUTS, "--uts"),
    (CloneFlags::CLONE_NEWCGROUP, "--cgroup"),
    (CloneFlags::CLONE_NEWUSER, "--user --map-root-user"),
];

impl Namespace {
    /// Namespaces named by `flags` (`CLONE_NEW*`). Rejects empty sets and non-namespace flags.
    pub fn new(flags: CloneFlags) -> ExecResult<Self> {
        if flags.is_empty() {
            return Err(ExecError::InvalidDecorator(
                "namespace decorator needs at least one CLONE_NEW* flag".into(),
            ));
        }

        let known = SUPPORTED
            .iter()
            .fold(CloneFlags::empty(), |acc, (flag, _)| acc | *flag);
        let unknown = flags - known;
        if !unknown.is_empty() {
            return Err(ExecError::InvalidDecorator(format!(
                "unsupported namespace flags: {unknown:?}"
            )));
        }

        Ok(Self { flags })
    }

    /// New PID namespace with its own `/proc`.
    pub fn pid() -> Self {
        Self {
            flags: CloneFlags::CLONE_NEWPID,
        }
    }

    pub fn flags(&self) -> CloneFlags {
        self.flags
    }

    fn prefix(&self) -> String {
        let mut prefix = String::from("unshare --fork --kill-child");
        for (flag, args) in SUPPORTED {
            if self.flags.contains(*flag) {
                prefix.push(' ');
                prefix.push_str(args);
            }
        }
        prefix
    }
}

impl Decorator for Namespace {
    fn name(&self) -> &'static str {
        "namespace"
    }

    fn decorate(&self, command: Command) -> Command {
        let prefix = self.prefix();
        command.map_line(|line| shell::wrap(&prefix, &line))
    }
}
