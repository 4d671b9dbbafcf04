//! Emporium game server binary.
//!
//! # Startup Sequence
//!
//! 1. Load `emporium-config.yaml` and environment overrides
//! 2. Initialize structured logging (tracing)
//! 3. Load and validate the game catalog
//! 4. Open the document store, recovering from its backup if needed
//! 5. Drop shutdown-scoped scheduler tasks left by a previous run
//! 6. Start the scheduler worker and the WebSocket server
//! 7. On `Ctrl-C`/`SIGTERM`: stop both, clean up scheduler tasks, exit

mod config;
mod scheduler;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use emporium_game::{Catalog, Clock, Game, GameSettings, SystemClock};
use emporium_server::{AccessPolicy, AppState, ServerConfig};
use emporium_store::DocumentStore;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{EmporiumConfig, LoggingSection};

const CONFIG_FILE: &str = "emporium-config.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EmporiumConfig::load(Path::new(CONFIG_FILE)).context("loading configuration")?;
    init_tracing(&config.logging);
    info!(
        port = config.server.port,
        config_dir = %config.game.config_dir.display(),
        store = %config.store.path.display(),
        admins = config.server.admin_ids.len(),
        "emporium-engine starting"
    );
    if config.server.update_password.is_empty() {
        warn!("UPDATE_PASSWORD is empty, mutating commands need no password");
    }

    let catalog = Catalog::load_dir(&config.game.config_dir)
        .with_context(|| format!("loading catalog from {}", config.game.config_dir.display()))?;

    if let Some(parent) = config.store.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating store directory {}", parent.display()))?;
    }
    let store = DocumentStore::open(&config.store.path)
        .with_context(|| format!("opening store {}", config.store.path.display()))?;

    let mut game = Game::new(
        Arc::new(store),
        Arc::new(catalog),
        Arc::new(SystemClock) as Arc<dyn Clock>,
        GameSettings {
            event_chance_percent: config.game.event_chance_percent,
            seed: config.game.seed,
        },
    );
    game.cleanup_time_tasks().context("cleaning scheduler tasks at boot")?;
    info!(symbols = ?game.task_symbols(), "game engine ready");

    let policy = AccessPolicy {
        update_password: config.server.update_password.clone(),
        admin_ids: config.server.admin_ids.iter().cloned().collect::<BTreeSet<_>>(),
    };
    let state = AppState::new(game, policy).shared();

    let (stop_tx, stop_rx) = watch::channel(false);
    let worker = tokio::spawn(scheduler::run(
        Arc::clone(&state),
        Duration::from_millis(config.scheduler.poll_interval_ms.max(1)),
        stop_rx,
    ));

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let served = emporium_server::start_server(&server_config, Arc::clone(&state), shutdown_signal()).await;

    if stop_tx.send(true).is_err() {
        debug!("scheduler worker already gone");
    }
    worker.await.context("scheduler worker panicked")?;

    let removed = state
        .game
        .lock()
        .await
        .cleanup_time_tasks()
        .context("cleaning scheduler tasks at shutdown")?;
    info!(removed, "emporium-engine shutdown complete");

    served.context("command server failed")
}

/// Text or JSON output, filtered by `RUST_LOG` or the configured level.
fn init_tracing(logging: &LoggingSection) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}
