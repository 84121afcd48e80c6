//! Process-group signalling and exit status mapping.

use std::str::FromStr;

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;

use kestrel_model::signal_exit_code;

/// Send `signal` to every member of process group `pgid`. An already empty group is not an error.
pub fn signal_group(pgid: i32, signal: Signal) -> nix::Result<()> {
    match killpg(Pid::from_raw(pgid), signal) {
        Err(Errno::ESRCH) => Ok(()),
        other => other,
    }
}

/// Whether any live (non-zombie) process remains in group `pgid`.
///
/// Zombies are ignored: once killed, orphaned members are reaped by whatever adopted them, which
/// in minimal containers may never happen.
pub fn group_alive(pgid: i32) -> bool {
    #[cfg(target_os = "linux")]
    {
        if let Ok(members) = procfs::live_group_members(pgid) {
            return !members.is_empty();
        }
    }
    killpg(Pid::from_raw(pgid), None).is_ok()
}

/// Exit code for a process that `status` describes; signal deaths become `128 + signal`.
pub fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => signal_exit_code(signal),
        (None, None) => -1,
    }
}

/// Map an SSH `exit-signal` name (`TERM`, `KILL`, ...) to its signal number.
pub fn signal_number(name: &str) -> Option<i32> {
    let name = name.trim();
    let full = if name.starts_with("SIG") {
        name.to_string()
    } else {
        format!("SIG{name}")
    };
    Signal::from_str(&full).ok().map(|s| s as i32)
}

#[cfg(target_os = "linux")]
pub(crate) mod procfs {
    use std::{fs, io};

    /// Pids of non-zombie processes whose process group is `pgid`.
    pub(crate) fn live_group_members(pgid: i32) -> io::Result<Vec<i32>> {
        let mut members = Vec::new();
        for entry in fs::read_dir("/proc")? {
            let entry = entry?;
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|s| s.parse::<i32>().ok())
            else {
                continue;
            };
            // The process may exit between listing and reading.
            let Ok(stat) = fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            if let Some((state, pgrp)) = parse_stat(&stat)
                && pgrp == pgid
                && !matches!(state, 'Z' | 'X')
            {
                members.push(pid);
            }
        }
        Ok(members)
    }

    /// `(state, pgrp)` from a `/proc/<pid>/stat` line. `comm` may contain spaces and parens, so
    /// fields are counted from the last `)`.
    pub(crate) fn parse_stat(stat: &str) -> Option<(char, i32)> {
        let rest = &stat[stat.rfind(')')? + 1..];
        let mut fields = rest.split_whitespace();
        let state = fields.next()?.chars().next()?;
        let _ppid = fields.next()?;
        let pgrp = fields.next()?.parse().ok()?;
        Some((state, pgrp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_signal_names() {
        assert_eq!(signal_number("TERM"), Some(15));
        assert_eq!(signal_number("KILL"), Some(9));
        assert_eq!(signal_number("SIGINT"), Some(2));
        assert_eq!(signal_number("BOGUS"), None);
    }

    #[test]
    fn exit_codes_from_status() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(exit_code(std::process::ExitStatus::from_raw(3 << 8)), 3);
        assert_eq!(exit_code(std::process::ExitStatus::from_raw(15)), 143);
    }

    #[test]
    fn empty_group_signal_is_ok() {
        // Pid max is well below this on every Linux configuration.
        assert!(signal_group(0x3fff_fff0, Signal::SIGTERM).is_ok());
        assert!(!group_alive(0x3fff_fff0));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn stat_parsing_handles_odd_comm() {
        let stat = "4242 (my (weird) proc) S 1 4200 4200 0 -1 4194560 100";
        assert_eq!(procfs::parse_stat(stat), Some(('S', 4200)));
        assert_eq!(procfs::parse_stat("garbage"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn own_group_is_alive() {
        let pgid = nix::unistd::getpgrp().as_raw();
        assert!(group_alive(pgid));
    }
}
