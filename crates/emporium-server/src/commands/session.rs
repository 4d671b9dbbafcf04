//! Session commands.

use emporium_game::{Game, GameError, position_key};
use emporium_types::{SessionId, SessionStage};
use serde::Deserialize;
use serde_json::{Value, json};

use super::to_json;
use crate::dispatcher::{Access, Dispatcher, Request};

pub(super) fn register(d: &mut Dispatcher) {
    d.register("create-session", Access::Admin, create_session);
    d.register("get-session", Access::Read, get_session);
    d.register("get-sessions", Access::Read, get_sessions);
    d.register("update-session-stage", Access::Admin, update_session_stage);
    d.register("delete-session", Access::Admin, delete_session);
    d.register("get-sessions-free-cells", Access::Read, free_cells);
}

#[derive(Debug, Deserialize)]
struct SessionArgs {
    session_id: SessionId,
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    session_id: Option<String>,
}

fn create_session(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: CreateArgs = req.args()?;
    to_json(&game.create_session(args.session_id.as_deref())?)
}

fn get_session(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: SessionArgs = req.args()?;
    to_json(&game.session(&args.session_id)?)
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    stage: Option<SessionStage>,
}

fn get_sessions(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: ListArgs = req.args()?;
    to_json(&game.sessions(args.stage)?)
}

#[derive(Debug, Deserialize)]
struct StageArgs {
    session_id: SessionId,
    stage: SessionStage,
}

fn update_session_stage(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: StageArgs = req.args()?;
    to_json(&game.update_session_stage(&args.session_id, args.stage)?)
}

#[derive(Debug, Deserialize)]
struct DeleteArgs {
    session_id: SessionId,
    #[serde(default)]
    really: bool,
}

fn delete_session(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: DeleteArgs = req.args()?;
    if !args.really {
        return Err(GameError::Validation(String::from(
            "deleting a session requires really=true",
        )));
    }
    game.delete_session(&args.session_id)?;
    Ok(json!({ "session_id": args.session_id, "deleted": true }))
}

fn free_cells(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: SessionArgs = req.args()?;
    let cells: Vec<Value> = game
        .free_cells(&args.session_id)?
        .into_iter()
        .map(|(x, y)| json!({ "x": x, "y": y, "position": position_key(x, y) }))
        .collect();
    Ok(json!({ "session_id": args.session_id, "cells": cells }))
}
