//! Command dispatch.
//!
//! A [`Dispatcher`] maps a frame's `type` to a registered [`Handler`].
//! Dispatching is synchronous and runs against a borrowed [`Game`], so a
//! command and the broadcasts it causes are one unit: the caller holds
//! the game lock across [`Dispatcher::dispatch`] and the fan-out.
//!
//! Reply rules:
//!
//! - With a `request_id`, the result goes back to the caller only, as
//!   `{"type": "response", "request_id": ..., "data": ...}`.
//! - Without one, the result is dropped unless the command is registered
//!   as direct (`ping`).
//! - Any failure becomes `{"type": "error", "message": ..., "kind": ...}`
//!   for the caller. An unknown `type` also lists `available_types`.

use std::collections::{BTreeMap, BTreeSet};

use emporium_game::{Game, GameError};
use emporium_types::ApiEvent;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::commands;

/// A command implementation.
pub type Handler = fn(&mut Game, &Request<'_>) -> Result<Value, GameError>;

/// Who may run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Anyone.
    Read,
    /// Requires the update password.
    Mutate,
    /// Requires the update password and, when an admin list is
    /// configured, an admin `client_id`.
    Admin,
}

#[derive(Debug, Clone, Copy)]
struct Command {
    handler: Handler,
    access: Access,
    direct: bool,
}

/// Credentials checked before mutating commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Shared secret every mutating frame must carry as `password`.
    pub update_password: String,
    /// Client ids allowed to run [`Access::Admin`] commands. Empty means
    /// no restriction beyond the password.
    pub admin_ids: BTreeSet<String>,
}

/// An inbound frame as seen by a handler.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    /// The command name.
    pub kind: &'a str,
    /// The connection that sent the frame.
    pub client_id: &'a str,
    /// The whole frame, including `type` and `request_id`.
    pub frame: &'a Value,
}

impl Request<'_> {
    /// Deserialize the frame into the command's argument struct.
    ///
    /// Unknown fields such as `type`, `password` and `request_id` are
    /// ignored.
    pub fn args<T: DeserializeOwned>(&self) -> Result<T, GameError> {
        T::deserialize(self.frame)
            .map_err(|e| GameError::Validation(format!("invalid {} payload: {e}", self.kind)))
    }
}

/// What a dispatch produced, in send order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatch {
    /// Broadcast frames, in emission order.
    pub broadcasts: Vec<Value>,
    /// Frame for the calling client, if any.
    pub reply: Option<Value>,
}

/// Registry of commands.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    commands: BTreeMap<&'static str, Command>,
    policy: AccessPolicy,
}

impl Dispatcher {
    /// A dispatcher with no commands.
    pub const fn new(policy: AccessPolicy) -> Self {
        Self {
            commands: BTreeMap::new(),
            policy,
        }
    }

    /// A dispatcher with every game command registered.
    pub fn standard(policy: AccessPolicy) -> Self {
        let mut dispatcher = Self::new(policy);
        commands::register_all(&mut dispatcher);
        dispatcher
    }

    /// Register `handler` under `name`, replacing any previous one.
    pub fn register(&mut self, name: &'static str, access: Access, handler: Handler) {
        self.commands.insert(
            name,
            Command {
                handler,
                access,
                direct: false,
            },
        );
    }

    /// Register a read command whose result is sent to the caller even
    /// without a `request_id`.
    pub fn register_direct(&mut self, name: &'static str, handler: Handler) {
        self.commands.insert(
            name,
            Command {
                handler,
                access: Access::Read,
                direct: true,
            },
        );
    }

    /// Registered command names, sorted.
    pub fn message_types(&self) -> Vec<&'static str> {
        self.commands.keys().copied().collect()
    }

    /// Run one frame from `client_id`.
    pub fn dispatch(&self, game: &mut Game, client_id: &str, frame: &Value) -> Dispatch {
        let request_id = frame.get("request_id").filter(|v| !v.is_null()).cloned();
        let kind = frame.get("type").and_then(Value::as_str).unwrap_or("unknown");

        let Some(command) = self.commands.get(kind) else {
            warn!(client_id, message_type = kind, "unknown message type");
            return Dispatch {
                broadcasts: Vec::new(),
                reply: Some(json!({
                    "type": "error",
                    "message": format!("unknown message type: {kind}"),
                    "available_types": self.message_types(),
                })),
            };
        };

        if let Err(err) = self.authorize(command.access, client_id, frame) {
            warn!(client_id, message_type = kind, "rejected unauthorized command");
            return Dispatch {
                broadcasts: Vec::new(),
                reply: Some(error_envelope(&err, request_id)),
            };
        }

        debug!(client_id, message_type = kind, "dispatching");
        let request = Request {
            kind,
            client_id,
            frame,
        };
        let result = (command.handler)(game, &request);
        let broadcasts = game.drain_events().iter().map(ApiEvent::to_message).collect();

        let reply = match result {
            Ok(data) => match request_id {
                Some(request_id) => Some(json!({
                    "type": "response",
                    "request_id": request_id,
                    "data": data,
                })),
                None if command.direct => Some(data),
                None => None,
            },
            Err(err) => {
                warn!(client_id, message_type = kind, kind = err.kind(), error = %err, "command failed");
                Some(error_envelope(&err, request_id))
            }
        };
        Dispatch { broadcasts, reply }
    }

    fn authorize(&self, access: Access, client_id: &str, frame: &Value) -> Result<(), GameError> {
        if access == Access::Read {
            return Ok(());
        }
        let password = frame.get("password").and_then(Value::as_str).unwrap_or("");
        if password != self.policy.update_password {
            return Err(GameError::Auth(String::from("invalid password")));
        }
        if access == Access::Admin
            && !self.policy.admin_ids.is_empty()
            && !self.policy.admin_ids.contains(client_id)
        {
            return Err(GameError::Auth(format!("client {client_id} is not an admin")));
        }
        Ok(())
    }
}

fn error_envelope(err: &GameError, request_id: Option<Value>) -> Value {
    let mut envelope = json!({
        "type": "error",
        "message": err.to_string(),
        "kind": err.kind(),
    });
    if let (Some(request_id), Some(map)) = (request_id, envelope.as_object_mut()) {
        map.insert(String::from("request_id"), request_id);
    }
    envelope
}
