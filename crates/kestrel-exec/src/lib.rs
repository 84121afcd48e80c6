//! Uniform process lifecycle across local, remote and isolated execution.
//!
//! An [`Executor`] turns a [`Command`] into a running process tree and hands back a
//! [`TaskHandle`]. Before anything runs, the executor folds the command through its
//! [`Decorators`] chain, so isolation and placement (PID namespaces, CPU pinning, cgroups, ...)
//! look the same whether the process runs on this host or over SSH.
//!
//! ```no_run
//! # async fn demo() -> kestrel_exec::ExecResult<()> {
//! use kestrel_exec::prelude::*;
//!
//! let pinned = kestrel_topo::select::shared_cache_threads()
//!     .map_err(|e| ExecError::Config(e.to_string()))?;
//! let decorators = Decorators::new()
//!     .with(Taskset::new(&pinned)?)
//!     .with(Namespace::pid());
//!
//! let executor = LocalExecutor::new(decorators);
//! let task = executor.execute(Command::new("stress-ng --cpu 1")).await?;
//! task.stop().await?;
//! assert!(!task.is_running());
//! # Ok(())
//! # }
//! ```

mod error;
pub use error::{ErrorKind, ExecError, ExecResult};

mod executor;
pub use executor::{Executor, TaskHandle, stop_all};

mod launcher;
pub use launcher::{CommandLauncher, Launcher};

mod output;

mod state;

mod stop;
pub use stop::StopPolicy;

pub mod isolation;
pub use isolation::{Decorator, Decorators};

pub mod utils;

#[cfg(feature = "local")]
pub mod local;
#[cfg(feature = "local")]
pub use local::{LocalConfig, LocalExecutor};

#[cfg(feature = "remote")]
pub mod remote;
#[cfg(feature = "remote")]
pub use remote::{ClientConfig, Credential, HostKeyPolicy, RemoteExecutor, SshConfig};

pub use kestrel_model::{Command, Env, ExitOutcome, TaskId, TaskState};

pub mod prelude {
    pub use crate::isolation::{CgroupExec, Namespace, Nice, Numactl, Taskset};
    pub use crate::{
        Command, CommandLauncher, Decorator, Decorators, ExecError, ExecResult, Executor,
        Launcher, StopPolicy, TaskHandle, TaskState,
    };

    #[cfg(feature = "local")]
    pub use crate::{LocalConfig, LocalExecutor};
    #[cfg(feature = "remote")]
    pub use crate::{ClientConfig, Credential, RemoteExecutor, SshConfig};
}
