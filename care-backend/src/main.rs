//! care-agent: runs one agent role (orchestrator or a specialist).
//!
//! Role, port and model are chosen by environment; see `Config`.
//! Default: the orchestrator on http://127.0.0.1:10000/

use care_backend::config::Config;
use care_backend::discovery::AgentRegistry;
use care_backend::server::{self, AppState};
use care_backend::tasks::{TaskManager, TaskStore};
use care_backend::CareResult;
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    if let Err(e) = run().await {
        log::error!("care-agent stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> CareResult<()> {
    let config = Config::from_env()?;
    log::info!(
        "Starting {} ({:?} routing, registry {})",
        config.role.agent_name(),
        config.routing_mode,
        config.registry_path.display()
    );

    let registry = Arc::new(AgentRegistry::load(&config.registry_path, config.name_match)?);
    let reasoner = config.role.build_reasoner(&config, Arc::clone(&registry))?;
    watch_reload(registry);

    let state = Arc::new(AppState {
        manager: TaskManager::new(
            config.role.agent_name(),
            Arc::new(TaskStore::new()),
            reasoner,
            config.reasoning_timeout,
        ),
        card: config.role.card(&config.public_url),
        start_time: Instant::now(),
    });

    server::serve(&config.bind_addr(), state).await
}

/// SIGHUP re-reads the registry file.
#[cfg(unix)]
fn watch_reload(registry: Arc<AgentRegistry>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            log::warn!("[Discovery] SIGHUP reload unavailable: {}", e);
            return;
        }
    };
    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            // Failures are logged by the registry; the old snapshot stays.
            let _ = registry.reload();
        }
    });
}

#[cfg(not(unix))]
fn watch_reload(_registry: Arc<AgentRegistry>) {}
