//! WebSocket command server for the Emporium game engine.
//!
//! Clients hold one `WebSocket` each at `/ws/connect`. Every text frame
//! is a command `{"type": ..., "request_id"?: ..., ...}` routed by the
//! [`Dispatcher`] to a game operation. State changes fan out to every
//! client through the [`Hub`] as `api-*` broadcasts.
//!
//! # Modules
//!
//! - [`hub`] -- Client registry, targeted sends and broadcast
//! - [`dispatcher`] -- Command registry, access checks, reply envelopes
//! - `commands` -- Handlers for sessions, users, companies, factories,
//!   exchange, contracts and statistics
//! - [`state`] -- [`AppState`] shared by the router and the scheduler
//! - [`router`], [`ws`], [`handlers`], [`server`] -- HTTP surface

mod commands;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use dispatcher::{Access, AccessPolicy, Dispatch, Dispatcher, Handler, Request};
pub use error::ServerError;
pub use hub::Hub;
pub use router::build_router;
pub use server::{ServerConfig, start_server};
pub use state::AppState;
