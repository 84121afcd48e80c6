use std::fmt;
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::stop::millis;
use crate::{ExecError, ExecResult, StopPolicy};

/// How the SSH client authenticates.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Credential {
    /// Private key file, optionally passphrase protected.
    KeyFile {
        path: PathBuf,
        #[serde(default)]
        passphrase: Option<String>,
    },
    /// Keys offered by the running `ssh-agent`.
    Agent,
    Password { password: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::KeyFile { path, passphrase } => f
                .debug_struct("KeyFile")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
            Credential::Agent => f.write_str("Agent"),
            Credential::Password { .. } => f
                .debug_struct("Password")
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Who to log in as, and how.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    pub user: String,
    pub credential: Credential,
}

impl ClientConfig {
    /// Key-file login as `user`. Fails if `key_path` cannot be read.
    pub fn new(user: impl Into<String>, key_path: impl Into<PathBuf>) -> ExecResult<Self> {
        let path = key_path.into();
        File::open(&path)
            .map_err(|e| ExecError::Config(format!("private key {}: {e}", path.display())))?;

        Ok(Self {
            user: user.into(),
            credential: Credential::KeyFile {
                path,
                passphrase: None,
            },
        })
    }

    pub fn with_agent(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            credential: Credential::Agent,
        }
    }

    pub fn with_password(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            credential: Credential::Password {
                password: password.into(),
            },
        }
    }
}

/// Server host key verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostKeyPolicy {
    #[default]
    AcceptAny,
    /// Require a matching entry in an OpenSSH `known_hosts` file.
    KnownHosts(PathBuf),
}

/// Target host plus everything needed to run and stop tasks on it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshConfig {
    pub client: ClientConfig,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(
        default = "default_connect_timeout",
        rename = "connectTimeoutMs",
        with = "millis"
    )]
    pub connect_timeout: Duration,
    #[serde(default)]
    pub host_key: HostKeyPolicy,
    #[serde(default)]
    pub stop: StopPolicy,
    /// Local directory receiving captured output. Defaults to the system temp dir.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

impl SshConfig {
    pub fn new(client: ClientConfig, host: impl Into<String>, port: u16) -> Self {
        Self {
            client,
            host: host.into(),
            port,
            connect_timeout: default_connect_timeout(),
            host_key: HostKeyPolicy::default(),
            stop: StopPolicy::default(),
            output_dir: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_host_key(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key = policy;
        self
    }

    pub fn with_stop(mut self, stop: StopPolicy) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// `host:port`, for logs.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_a_config_error() {
        let err = ClientConfig::new("bench", "/nonexistent/id_ed25519").unwrap_err();
        assert!(matches!(err, ExecError::Config(_)));
    }

    #[test]
    fn readable_key_is_accepted() {
        let path = std::env::temp_dir().join(format!("kestrel-key-{}", std::process::id()));
        std::fs::write(&path, "not really a key").unwrap();

        let client = ClientConfig::new("bench", &path).unwrap();
        assert_eq!(
            client.credential,
            Credential::KeyFile {
                path: path.clone(),
                passphrase: None
            }
        );
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn secrets_are_not_printed() {
        let client = ClientConfig::with_password("bench", "hunter2");
        assert!(!format!("{client:?}").contains("hunter2"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: SshConfig = serde_json::from_str(
            r#"{
                "client": { "user": "bench", "credential": { "type": "agent" } },
                "host": "10.0.0.7"
            }"#,
        )
        .unwrap();

        assert_eq!(config.port, 22);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.host_key, HostKeyPolicy::AcceptAny);
        assert_eq!(config.stop, StopPolicy::default());
        assert_eq!(config.endpoint(), "10.0.0.7:22");
    }

    #[test]
    fn deserializes_known_hosts_and_key_file() {
        let config: SshConfig = serde_json::from_str(
            r#"{
                "client": {
                    "user": "bench",
                    "credential": { "type": "keyFile", "path": "/home/bench/.ssh/id_rsa" }
                },
                "host": "lb-1",
                "port": 2222,
                "connectTimeoutMs": 1500,
                "hostKey": { "knownHosts": "/home/bench/.ssh/known_hosts" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.port, 2222);
        assert_eq!(config.connect_timeout, Duration::from_millis(1500));
        assert_eq!(
            config.host_key,
            HostKeyPolicy::KnownHosts(PathBuf::from("/home/bench/.ssh/known_hosts"))
        );
    }
}
