//! Co-locate a latency-sensitive workload with an antagonist on the same socket.
//!
//! The workload is pinned to one hardware thread per physical core of the first socket; the
//! antagonist runs on the hyperthread siblings of those threads at the lowest priority. Both
//! are stopped after `KESTREL_DEMO_SECS` seconds (default 5) or on Ctrl+C.
//!
//! ```text
//! placement ["<workload line>" ["<antagonist line>"]]
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use kestrel_exec::prelude::*;
use kestrel_exec::stop_all;
use kestrel_observe::{LoggerConfig, LoggerLevel, init_logger};
use kestrel_topo::CoreSelector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = LoggerConfig {
        level: LoggerLevel::new("debug")?,
        ..Default::default()
    };
    init_logger(&cfg)?;

    let mut args = std::env::args().skip(1);
    let workload = args.next().unwrap_or_else(|| "sleep 3600".to_string());
    let antagonist = args.next().unwrap_or_else(|| "sleep 3600".to_string());
    let secs: u64 = std::env::var("KESTREL_DEMO_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    let selector = CoreSelector::discover()?;
    info!(
        sockets = selector.topology().socket_count(),
        cores = selector.topology().core_count(),
        threads = %selector.topology().threads(),
        "topology discovered"
    );

    let reserved = selector.shared_cache_threads()?;
    let siblings = selector.sibling_threads_of_set(&reserved)?;
    info!(%reserved, %siblings, "placement computed");

    let workload_exec: Arc<dyn Executor> = Arc::new(LocalExecutor::new(
        Decorators::new().with(Taskset::new(&reserved)?),
    ));
    let mut launchers = vec![CommandLauncher::new(
        "workload",
        Command::new(workload),
        workload_exec,
    )];

    if siblings.is_empty() {
        warn!("no hyperthread siblings on this host; running without antagonist");
    } else {
        let antagonist_exec: Arc<dyn Executor> = Arc::new(LocalExecutor::new(
            Decorators::new()
                .with(Taskset::new(&siblings)?)
                .with(Nice::new(19)?),
        ));
        launchers.push(CommandLauncher::new(
            "antagonist",
            Command::new(antagonist),
            antagonist_exec,
        ));
    }

    let mut tasks = Vec::with_capacity(launchers.len());
    for launcher in &launchers {
        let task = launcher.launch().await?;
        info!(launcher = launcher.name(), id = %task.id(), line = %task.command(), "launched");
        tasks.push(task);
    }

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(secs)) => info!("run finished"),
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    stop_all(&tasks).await?;
    for task in &tasks {
        info!(
            id = %task.id(),
            exit_code = task.exit_code()?,
            stdout = ?task.stdout_path(),
            "stopped"
        );
    }

    Ok(())
}
