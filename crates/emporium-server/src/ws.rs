//! `WebSocket` endpoint.
//!
//! Clients connect to `GET /ws/connect?client_id=<id>`. A missing id gets
//! a random UUID. Each connection registers an outbound channel with the
//! [`Hub`](crate::hub::Hub) and then multiplexes two streams: frames queued
//! for the client and frames sent by it. Inbound text frames are
//! dispatched one at a time, so a client's commands run in submission
//! order.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::state::AppState;

/// Query string of the connect endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct ConnectQuery {
    /// Stable id chosen by the client.
    pub client_id: Option<String>,
}

/// Upgrade an HTTP request to a command connection.
///
/// # Route
///
/// `GET /ws/connect`
pub async fn ws_connect(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let client_id = query
        .client_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    ws.on_upgrade(move |socket| handle_ws(socket, state, client_id))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, client_id: String) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let serial = state.hub.register(&client_id, tx).await;

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(text) = outbound else {
                    // Evicted by a newer connection with the same id.
                    debug!(client_id, "connection replaced, closing");
                    if socket.send(Message::Close(None)).await.is_err() {
                        debug!(client_id, "close frame not delivered");
                    }
                    break;
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    debug!(client_id, "WebSocket client disconnected (send failed)");
                    break;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        state.handle_text(&client_id, text.as_str()).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(client_id, "WebSocket client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(client_id, "WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(client_id, "WebSocket error: {e}");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary and pong frames carry no commands.
                    }
                }
            }
        }
    }

    state.hub.unregister(&client_id, serial).await;
}
