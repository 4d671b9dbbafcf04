//! Shared application state.
//!
//! [`AppState`] ties the [`Game`] to the [`Hub`]. The game sits behind a
//! single async mutex: a command, its broadcasts and its reply are
//! produced and queued while the lock is held, so every client observes
//! mutations in one total order. The scheduler tick takes the same lock.

use std::sync::Arc;

use emporium_game::{Game, GameError};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::debug;

use crate::dispatcher::{AccessPolicy, Dispatch, Dispatcher};
use crate::hub::Hub;

/// Shared state for the Axum application.
#[derive(Debug)]
pub struct AppState {
    /// The engine.
    pub game: Mutex<Game>,
    /// Connected clients.
    pub hub: Hub,
    /// Command registry.
    pub dispatcher: Dispatcher,
}

impl AppState {
    /// State with the standard command set.
    pub fn new(game: Game, policy: AccessPolicy) -> Self {
        Self::with_dispatcher(game, Dispatcher::standard(policy))
    }

    /// State with a custom dispatcher.
    pub fn with_dispatcher(game: Game, dispatcher: Dispatcher) -> Self {
        Self {
            game: Mutex::new(game),
            hub: Hub::new(),
            dispatcher,
        }
    }

    /// Wrap in an [`Arc`] for the router.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Handle one text frame from `client_id`.
    ///
    /// A frame that is not JSON is treated as `{"type": "text"}` and
    /// therefore answered with the unknown-type error.
    pub async fn handle_text(&self, client_id: &str, text: &str) -> Dispatch {
        let frame: Value = serde_json::from_str(text)
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| json!({ "type": "text", "content": text }));

        let mut game = self.game.lock().await;
        let out = self.dispatcher.dispatch(&mut game, client_id, &frame);
        self.deliver(client_id, &out).await;
        out
    }

    /// Run due wall-clock tasks and broadcast what they changed.
    pub async fn scheduler_tick(&self) -> Result<usize, GameError> {
        let mut game = self.game.lock().await;
        let ran = game.run_due_tasks();
        let events = game.drain_events();
        for event in &events {
            self.hub.broadcast(&event.to_message()).await;
        }
        if !events.is_empty() {
            debug!(broadcasts = events.len(), "scheduler tick broadcast");
        }
        ran
    }

    /// Number of sessions in the store.
    pub async fn session_count(&self) -> Result<usize, GameError> {
        Ok(self.game.lock().await.sessions(None)?.len())
    }

    async fn deliver(&self, client_id: &str, out: &Dispatch) {
        for message in &out.broadcasts {
            self.hub.broadcast(message).await;
        }
        if let Some(reply) = &out.reply {
            self.hub.send(client_id, reply).await;
        }
    }
}
