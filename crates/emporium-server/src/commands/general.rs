//! `ping` and `get-statistics`.

use emporium_game::{Game, GameError};
use emporium_types::{CompanyId, SessionId};
use serde::Deserialize;
use serde_json::{Value, json};

use super::to_json;
use crate::dispatcher::{Access, Dispatcher, Request};

pub(super) fn register(d: &mut Dispatcher) {
    d.register_direct("ping", ping);
    d.register("get-statistics", Access::Read, get_statistics);
}

#[derive(Debug, Deserialize)]
struct PingArgs {
    #[serde(default)]
    timestamp: Value,
    content: Option<Value>,
}

fn ping(_game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: PingArgs = req.args()?;
    Ok(json!({
        "type": "pong",
        "timestamp": args.timestamp,
        "client_id": req.client_id,
        "content": args.content.unwrap_or_else(|| json!("Pong!")),
    }))
}

#[derive(Debug, Deserialize)]
struct StatisticsArgs {
    session_id: SessionId,
    company_id: Option<CompanyId>,
}

fn get_statistics(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: StatisticsArgs = req.args()?;
    to_json(&game.statistics(&args.session_id, args.company_id)?)
}
