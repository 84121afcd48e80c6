//! Blocking SSH plumbing. Everything here runs on tokio's blocking pool.

use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use ssh2::{CheckResult, ExtendedData, KnownHostFileKind, Session};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use kestrel_model::{Command, ExitOutcome, TaskState, signal_exit_code};

use super::{Credential, HostKeyPolicy, SshConfig};
use crate::state::StateTx;
use crate::utils::{shell, signal};
use crate::{ExecError, ExecResult, StopPolicy};

/// First line the task script prints: the pid of the remote session leader, which is also the
/// task's process group since sshd starts every session with `setsid`.
const PGID_MARKER: &str = "KESTREL_PGID ";

fn startup(context: &str) -> impl FnOnce(ssh2::Error) -> ExecError + '_ {
    move |e| ExecError::Startup(format!("{context}: {e}"))
}

fn runtime(context: impl Display) -> impl FnOnce(ssh2::Error) -> ExecError {
    move |e| ExecError::Runtime(format!("{context}: {e}"))
}

/// Open an authenticated session to `config.host`.
pub(crate) fn connect(config: &SshConfig) -> ExecResult<Session> {
    let endpoint = config.endpoint();
    let addr = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|e| ExecError::Startup(format!("resolve {endpoint}: {e}")))?
        .next()
        .ok_or_else(|| ExecError::Startup(format!("resolve {endpoint}: no addresses")))?;

    let tcp = TcpStream::connect_timeout(&addr, config.connect_timeout)
        .map_err(|e| ExecError::Startup(format!("connect {endpoint}: {e}")))?;

    let mut session = Session::new().map_err(startup("ssh session"))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout_ms(config.connect_timeout));
    session.handshake().map_err(startup("ssh handshake"))?;

    verify_host_key(&session, config)?;
    authenticate(&session, config)?;

    trace!(target: "kestrel.exec.remote", endpoint = %endpoint, user = %config.client.user, "connected");
    Ok(session)
}

fn verify_host_key(session: &Session, config: &SshConfig) -> ExecResult<()> {
    let HostKeyPolicy::KnownHosts(path) = &config.host_key else {
        return Ok(());
    };

    let mut known = session.known_hosts().map_err(startup("known hosts"))?;
    known
        .read_file(path, KnownHostFileKind::OpenSSH)
        .map_err(startup("read known_hosts"))?;
    let (key, _) = session
        .host_key()
        .ok_or_else(|| ExecError::Startup("server sent no host key".into()))?;

    match known.check_port(&config.host, config.port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(ExecError::Startup(format!(
            "host {} not found in {}",
            config.endpoint(),
            path.display()
        ))),
        CheckResult::Mismatch => Err(ExecError::Startup(format!(
            "host key mismatch for {}",
            config.endpoint()
        ))),
        CheckResult::Failure => Err(ExecError::Startup("host key check failed".into())),
    }
}

fn authenticate(session: &Session, config: &SshConfig) -> ExecResult<()> {
    let user = config.client.user.as_str();
    match &config.client.credential {
        Credential::KeyFile { path, passphrase } => session
            .userauth_pubkey_file(user, None, path, passphrase.as_deref())
            .map_err(startup("public key auth"))?,
        Credential::Agent => session.userauth_agent(user).map_err(startup("agent auth"))?,
        Credential::Password { password } => session
            .userauth_password(user, password)
            .map_err(startup("password auth"))?,
    }

    if !session.authenticated() {
        return Err(ExecError::Startup(format!("authentication as {user} rejected")));
    }
    Ok(())
}

fn timeout_ms(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}

fn is_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Script run through the remote login shell: report the session's pgid, apply the environment
/// overrides and replace itself with `sh -c <line>`.
pub(crate) fn task_script(command: &Command) -> ExecResult<String> {
    let mut inner = String::from("echo KESTREL_PGID $$; ");
    for kv in command.env().iter() {
        if !is_env_name(kv.key()) {
            return Err(ExecError::Startup(format!(
                "invalid environment variable name {:?}",
                kv.key()
            )));
        }
        inner.push_str(&format!("export {}={}; ", kv.key(), shell::quote(kv.value())));
    }
    inner.push_str(&format!("exec sh -c {}", shell::quote(command.line())));

    Ok(format!("exec sh -c {}", shell::quote(&inner)))
}

fn parse_marker(line: &str) -> Option<i32> {
    line.trim_end()
        .strip_prefix(PGID_MARKER)?
        .trim()
        .parse()
        .ok()
        .filter(|pgid: &i32| *pgid > 1)
}

/// Connect, start `script`, report its pgid through `started`, stream output into `stdout`
/// and publish the terminal state through `state`.
///
/// Failures before the pgid is known go to `started`; later failures become
/// [`ExitOutcome::Failed`].
pub(crate) fn run(
    config: &SshConfig,
    script: &str,
    stdout: File,
    started: oneshot::Sender<ExecResult<i32>>,
    state: StateTx,
) {
    let (session, mut channel) = match start(config, script) {
        Ok(started) => started,
        Err(e) => {
            let _ = started.send(Err(e));
            return;
        }
    };

    let outcome = stream(&session, &mut channel, stdout, started);
    let outcome = match outcome {
        Ok(()) => exit_outcome(&mut channel),
        Err(e) => ExitOutcome::Failed(e.to_string()),
    };
    trace!(target: "kestrel.exec.remote", host = %config.host, ?outcome, "remote task finished");
    state.terminate(TaskState::Terminated(outcome));
}

fn start(config: &SshConfig, script: &str) -> ExecResult<(Session, ssh2::Channel)> {
    let session = connect(config)?;
    let mut channel = session.channel_session().map_err(startup("open channel"))?;
    channel
        .handle_extended_data(ExtendedData::Merge)
        .map_err(startup("merge stderr"))?;
    channel.exec(script).map_err(startup("exec"))?;
    Ok((session, channel))
}

fn stream(
    session: &Session,
    channel: &mut ssh2::Channel,
    mut stdout: File,
    started: oneshot::Sender<ExecResult<i32>>,
) -> io::Result<()> {
    let mut reader = BufReader::new(channel);

    // Login shells may print before the marker; that text belongs to the task output.
    let mut line = String::new();
    let pgid = loop {
        line.clear();
        let read = match reader.read_line(&mut line) {
            Ok(read) => read,
            Err(e) => {
                let _ = started.send(Err(ExecError::Startup(format!("read pgid: {e}"))));
                return Err(e);
            }
        };
        if read == 0 {
            let _ = started.send(Err(ExecError::Startup(
                "remote shell exited before reporting its pgid".into(),
            )));
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no pgid marker"));
        }
        if let Some(pgid) = parse_marker(&line) {
            break pgid;
        }
        stdout.write_all(line.as_bytes())?;
    };

    session.set_timeout(0);
    if started.send(Ok(pgid)).is_err() {
        trace!(target: "kestrel.exec.remote", pgid, "task start abandoned by caller");
    }

    io::copy(&mut reader, &mut stdout)?;
    stdout.flush()
}

fn exit_outcome(channel: &mut ssh2::Channel) -> ExitOutcome {
    if let Err(e) = channel.wait_close() {
        return ExitOutcome::Failed(format!("channel close: {e}"));
    }

    let signaled = channel
        .exit_signal()
        .ok()
        .and_then(|s| s.exit_signal)
        .and_then(|name| signal::signal_number(&name));
    if let Some(sig) = signaled {
        return ExitOutcome::Exited(signal_exit_code(sig));
    }

    match channel.exit_status() {
        Ok(code) => ExitOutcome::Exited(code),
        Err(e) => ExitOutcome::Failed(format!("exit status: {e}")),
    }
}

/// Run `cmd` on `session` and return its exit status, discarding output.
fn status_of(session: &Session, cmd: &str) -> ExecResult<i32> {
    let context = format!("control command `{cmd}`");
    let mut channel = session.channel_session().map_err(runtime(&context))?;
    channel.exec(cmd).map_err(runtime(&context))?;
    io::copy(&mut channel, &mut io::sink())?;
    channel.wait_close().map_err(runtime(&context))?;
    channel.exit_status().map_err(runtime(&context))
}

fn group_alive(session: &Session, pgid: i32) -> ExecResult<bool> {
    Ok(status_of(session, &format!("kill -0 -- -{pgid} 2>/dev/null"))? == 0)
}

fn await_gone(session: &Session, pgid: i32, limit: Duration, poll: Duration) -> ExecResult<bool> {
    let deadline = Instant::now() + limit;
    loop {
        if !group_alive(session, pgid)? {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        thread::sleep(poll);
    }
}

/// Tear down remote process group `pgid` over a separate control session: `SIGTERM`, wait up
/// to `grace`, then `SIGKILL` and wait up to `kill_timeout`. Returns whether the group is gone.
pub(crate) fn stop_group(config: &SshConfig, pgid: i32, policy: &StopPolicy) -> ExecResult<bool> {
    // Control commands run under the connect timeout.
    let session = connect(config).map_err(|e| ExecError::Runtime(e.to_string()))?;

    debug!(target: "kestrel.exec.remote", host = %config.host, pgid, "sending SIGTERM");
    status_of(&session, &format!("kill -TERM -- -{pgid} 2>/dev/null"))?;
    if await_gone(&session, pgid, policy.grace, policy.poll_interval)? {
        return Ok(true);
    }

    debug!(
        target: "kestrel.exec.remote",
        host = %config.host,
        pgid,
        grace = ?policy.grace,
        "grace period expired, sending SIGKILL"
    );
    status_of(&session, &format!("kill -KILL -- -{pgid} 2>/dev/null"))?;
    await_gone(&session, pgid, policy.kill_timeout, policy.poll_interval)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_reports_pgid_then_execs_line() {
        let script = task_script(&Command::new("sleep 5 && echo done")).unwrap();
        assert_eq!(
            script,
            r#"exec sh -c 'echo KESTREL_PGID $$; exec sh -c '"'"'sleep 5 && echo done'"'"''"#
        );
    }

    #[test]
    fn script_exports_env_quoted() {
        let cmd = Command::new("env").with_env("GREETING", "hello world");
        let script = task_script(&cmd).unwrap();
        assert!(script.contains("export GREETING="));
        assert!(script.contains("hello world"));
    }

    #[test]
    fn invalid_env_name_is_rejected() {
        let cmd = Command::new("env").with_env("BAD-NAME", "x");
        assert!(matches!(task_script(&cmd), Err(ExecError::Startup(_))));
    }

    #[test]
    fn marker_parsing() {
        assert_eq!(parse_marker("KESTREL_PGID 4242\n"), Some(4242));
        assert_eq!(parse_marker("KESTREL_PGID 1\n"), None);
        assert_eq!(parse_marker("welcome to bench-3\n"), None);
        assert_eq!(parse_marker("KESTREL_PGID abc"), None);
    }

    #[test]
    fn env_names() {
        assert!(is_env_name("_PATH2"));
        assert!(!is_env_name("2PATH"));
        assert!(!is_env_name(""));
    }
}
