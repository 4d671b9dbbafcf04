//! Connection registry and fan-out.
//!
//! Every connected client owns an unbounded channel whose receiving end
//! is drained by its `WebSocket` task. The hub keeps the sending ends
//! keyed by `client_id`. Frames are serialized once and cloned per sink.
//!
//! Re-registering a `client_id` drops the previous sink, which closes the
//! older connection. Each registration gets a serial so the closing task
//! of the older connection cannot unregister its replacement.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

/// Sending half of a client connection.
pub type ClientSink = mpsc::UnboundedSender<String>;

#[derive(Debug)]
struct Connection {
    serial: u64,
    sink: ClientSink,
}

/// Registry of connected clients.
#[derive(Debug, Default)]
pub struct Hub {
    clients: Mutex<BTreeMap<String, Connection>>,
    serial: AtomicU64,
}

impl Hub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sink` under `client_id`, evicting any previous sink for
    /// the same id. Returns the serial to pass to [`Hub::unregister`].
    pub async fn register(&self, client_id: &str, sink: ClientSink) -> u64 {
        let serial = self.serial.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .clients
            .lock()
            .await
            .insert(client_id.to_owned(), Connection { serial, sink });
        if previous.is_some() {
            info!(client_id, "client reconnected, previous connection evicted");
        } else {
            info!(client_id, "client connected");
        }
        serial
    }

    /// Remove `client_id` if it is still registered under `serial`.
    pub async fn unregister(&self, client_id: &str, serial: u64) -> bool {
        let mut clients = self.clients.lock().await;
        if clients.get(client_id).is_some_and(|c| c.serial == serial) {
            clients.remove(client_id);
            info!(client_id, "client disconnected");
            true
        } else {
            false
        }
    }

    /// Send one frame to one client. A failed send unregisters the client.
    pub async fn send(&self, client_id: &str, message: &Value) -> bool {
        let text = message.to_string();
        let mut clients = self.clients.lock().await;
        let Some(conn) = clients.get(client_id) else {
            debug!(client_id, "send to unknown client dropped");
            return false;
        };
        if conn.sink.send(text).is_ok() {
            return true;
        }
        clients.remove(client_id);
        warn!(client_id, "send failed, client unregistered");
        false
    }

    /// Send one frame to every client. Returns how many received it.
    ///
    /// A failing sink is unregistered and does not affect delivery to the
    /// others.
    pub async fn broadcast(&self, message: &Value) -> usize {
        let text = message.to_string();
        let mut clients = self.clients.lock().await;
        let mut failed = Vec::new();
        let mut delivered = 0_usize;
        for (client_id, conn) in &*clients {
            if conn.sink.send(text.clone()).is_ok() {
                delivered = delivered.saturating_add(1);
            } else {
                failed.push(client_id.clone());
            }
        }
        for client_id in &failed {
            clients.remove(client_id);
        }
        if !failed.is_empty() {
            warn!(failed = failed.len(), "broadcast dropped dead clients");
        }
        delivered
    }

    /// Number of registered clients.
    pub async fn connected(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Registered client ids, sorted.
    pub async fn client_ids(&self) -> Vec<String> {
        self.clients.lock().await.keys().cloned().collect()
    }
}
