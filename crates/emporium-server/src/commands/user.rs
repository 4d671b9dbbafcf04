//! User commands.

use emporium_game::{Game, GameError};
use emporium_types::{CompanyId, SessionId, UserId};
use serde::Deserialize;
use serde_json::{Value, json};

use super::to_json;
use crate::dispatcher::{Access, Dispatcher, Request};

pub(super) fn register(d: &mut Dispatcher) {
    d.register("create-user", Access::Mutate, create_user);
    d.register("get-user", Access::Read, get_user);
    d.register("get-users", Access::Read, get_users);
    d.register("update-user", Access::Mutate, update_user);
    d.register("delete-user", Access::Mutate, delete_user);
}

#[derive(Debug, Deserialize)]
struct UserArgs {
    #[serde(alias = "id")]
    user_id: UserId,
    session_id: SessionId,
}

#[derive(Debug, Deserialize)]
struct NamedUserArgs {
    #[serde(alias = "id")]
    user_id: UserId,
    session_id: SessionId,
    username: String,
}

fn create_user(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: NamedUserArgs = req.args()?;
    to_json(&game.create_user(&args.session_id, args.user_id, &args.username)?)
}

fn get_user(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: UserArgs = req.args()?;
    to_json(&game.user(args.user_id, &args.session_id)?)
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    session_id: Option<SessionId>,
    company_id: Option<CompanyId>,
}

fn get_users(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: ListArgs = req.args()?;
    to_json(&game.users(args.session_id.as_ref(), args.company_id)?)
}

fn update_user(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: NamedUserArgs = req.args()?;
    to_json(&game.update_user(args.user_id, &args.session_id, &args.username)?)
}

fn delete_user(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: UserArgs = req.args()?;
    game.delete_user(args.user_id, &args.session_id)?;
    Ok(json!({ "user_id": args.user_id, "deleted": true }))
}
