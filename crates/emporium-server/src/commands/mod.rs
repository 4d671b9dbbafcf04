//! Command handlers, grouped by entity.
//!
//! Each submodule declares one argument struct per command and a
//! `register` function that wires its handlers into a [`Dispatcher`].
//! Handlers return the affected entity as JSON; broadcasts come from the
//! game outbox, not from the handlers.

use emporium_game::GameError;
use serde::Serialize;
use serde_json::Value;

use crate::dispatcher::Dispatcher;

mod company;
mod contract;
mod exchange;
mod factory;
mod general;
mod session;
mod user;

/// Register every command.
pub(crate) fn register_all(dispatcher: &mut Dispatcher) {
    general::register(dispatcher);
    session::register(dispatcher);
    user::register(dispatcher);
    company::register(dispatcher);
    factory::register(dispatcher);
    exchange::register(dispatcher);
    contract::register(dispatcher);
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, GameError> {
    Ok(serde_json::to_value(value)?)
}
