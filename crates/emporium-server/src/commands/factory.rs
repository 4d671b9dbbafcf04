//! Factory commands.

use emporium_game::{Game, GameError};
use emporium_types::{CompanyId, FactoryId};
use serde::Deserialize;
use serde_json::Value;

use super::to_json;
use crate::dispatcher::{Access, Dispatcher, Request};

pub(super) fn register(d: &mut Dispatcher) {
    d.register("get-factories", Access::Read, get_factories);
    d.register("get-factory", Access::Read, get_factory);
    d.register("factory-recomplectation", Access::Mutate, recomplectation);
    d.register("factory-set-produce", Access::Mutate, set_produce);
    d.register("factory-set-auto", Access::Mutate, set_auto);
    d.register("company-complete-free-factories", Access::Mutate, complete_free);
}

#[derive(Debug, Deserialize)]
struct CompanyArgs {
    company_id: CompanyId,
}

fn get_factories(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: CompanyArgs = req.args()?;
    to_json(&game.factories_of(args.company_id)?)
}

#[derive(Debug, Deserialize)]
struct FactoryArgs {
    factory_id: FactoryId,
}

fn get_factory(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: FactoryArgs = req.args()?;
    to_json(&game.factory(args.factory_id)?)
}

#[derive(Debug, Deserialize)]
struct RetoolArgs {
    factory_id: FactoryId,
    resource: String,
}

fn recomplectation(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: RetoolArgs = req.args()?;
    to_json(&game.recomplectation(args.factory_id, &args.resource)?)
}

#[derive(Debug, Deserialize)]
struct ProduceArgs {
    factory_id: FactoryId,
    produce: bool,
}

fn set_produce(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: ProduceArgs = req.args()?;
    to_json(&game.set_produce(args.factory_id, args.produce)?)
}

#[derive(Debug, Deserialize)]
struct AutoArgs {
    factory_id: FactoryId,
    is_auto: bool,
}

fn set_auto(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: AutoArgs = req.args()?;
    to_json(&game.set_auto(args.factory_id, args.is_auto)?)
}

#[derive(Debug, Deserialize)]
struct CompleteArgs {
    company_id: CompanyId,
    resource: String,
    count: u32,
}

fn complete_free(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: CompleteArgs = req.args()?;
    to_json(&game.complete_free_factories(args.company_id, &args.resource, args.count)?)
}
