//! The wall-clock scheduler worker.
//!
//! Polls [`AppState::scheduler_tick`] on a fixed interval until the stop
//! signal flips. Failures are logged and the loop keeps going.

use std::sync::Arc;
use std::time::Duration;

use emporium_server::AppState;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Run until `stop` becomes `true` or its sender is dropped.
pub async fn run(state: Arc<AppState>, every: Duration, mut stop: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_ms = every.as_millis(), "scheduler worker started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match state.scheduler_tick().await {
                    Ok(0) => {}
                    Ok(ran) => debug!(ran, "scheduled tasks ran"),
                    Err(err) => error!(error = %err, kind = err.kind(), "scheduler tick failed"),
                }
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }
    info!("scheduler worker stopped");
}
