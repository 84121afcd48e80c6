//! POSIX rlimits for locally spawned task shells.
//!
//! Limits are applied inside a `pre_exec` hook, which runs in the child after `fork()` and
//! immediately before `execve()`, so the task never runs without them. Every process the task
//! shell spawns inherits them.
use serde::Deserialize;
use tokio::process::Command;

/// Declarative rlimits for a task shell.
///
/// `None` leaves the inherited limit unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RlimitConfig {
    /// Maximum number of open file descriptors (`RLIMIT_NOFILE`).
    pub max_open_files: Option<u64>,

    /// Maximum size of created files in bytes (`RLIMIT_FSIZE`).
    ///
    /// Growing a file past this limit typically delivers `SIGXFSZ`.
    pub max_file_size_bytes: Option<u64>,

    /// Set `RLIMIT_CORE = 0`.
    pub disable_core_dumps: bool,
}

impl RlimitConfig {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.max_open_files.is_none()
            && !self.disable_core_dumps
            && self.max_file_size_bytes.is_none()
    }
}

/// Install a `pre_exec` hook applying `config` to `cmd`. No-op for an empty config.
pub fn attach_rlimits(cmd: &mut Command, config: &RlimitConfig) {
    if config.is_empty() {
        return;
    }

    let max_open_files = config.max_open_files;
    let max_file_size_bytes = config.max_file_size_bytes;
    let disable_core_dumps = config.disable_core_dumps;

    // SAFETY: the hook only calls `setrlimit`, which is async-signal-safe, and allocates nothing.
    unsafe {
        cmd.pre_exec(move || {
            if let Some(nofile) = max_open_files {
                apply_rlimit(libc::RLIMIT_NOFILE, nofile)?;
            }
            if let Some(fsize) = max_file_size_bytes {
                apply_rlimit(libc::RLIMIT_FSIZE, fsize)?;
            }
            if disable_core_dumps {
                apply_rlimit(libc::RLIMIT_CORE, 0)?;
            }
            Ok(())
        });
    }
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
type Resource = libc::__rlimit_resource_t;
#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
type Resource = libc::c_int;

fn apply_rlimit(resource: Resource, value: u64) -> std::io::Result<()> {
    let rlim = libc::rlimit {
        rlim_cur: value as libc::rlim_t,
        rlim_max: value as libc::rlim_t,
    };

    // SAFETY: `rlim` is a valid, initialized struct for the duration of the call.
    let rc = unsafe { libc::setrlimit(resource, &rlim) };
    if rc != 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}
