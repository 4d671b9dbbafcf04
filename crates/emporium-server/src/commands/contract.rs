//! Contract commands. `company_id` on accept, decline and execute is the
//! supplier.

use emporium_game::{Game, GameError};
use emporium_types::{CompanyId, ContractId};
use serde::Deserialize;
use serde_json::{Value, json};

use super::to_json;
use crate::dispatcher::{Access, Dispatcher, Request};

pub(super) fn register(d: &mut Dispatcher) {
    d.register("get-company-contracts", Access::Read, company_contracts);
    d.register("get-contract", Access::Read, get_contract);
    d.register("create-contract", Access::Mutate, create_contract);
    d.register("accept-contract", Access::Mutate, accept_contract);
    d.register("decline-contract", Access::Mutate, decline_contract);
    d.register("execute-contract", Access::Mutate, execute_contract);
}

#[derive(Debug, Deserialize)]
struct CompanyArgs {
    company_id: CompanyId,
}

fn company_contracts(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: CompanyArgs = req.args()?;
    to_json(&game.company_contracts(args.company_id)?)
}

#[derive(Debug, Deserialize)]
struct ContractArgs {
    contract_id: ContractId,
}

fn get_contract(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: ContractArgs = req.args()?;
    to_json(&game.contract(args.contract_id)?)
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    customer_company_id: CompanyId,
    supplier_company_id: CompanyId,
    resource: String,
    amount_per_turn: u32,
    duration_turns: u32,
    payment_amount: i64,
}

fn create_contract(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: CreateArgs = req.args()?;
    to_json(&game.create_contract(
        args.customer_company_id,
        args.supplier_company_id,
        &args.resource,
        args.amount_per_turn,
        args.duration_turns,
        args.payment_amount,
    )?)
}

#[derive(Debug, Deserialize)]
struct SupplierArgs {
    contract_id: ContractId,
    company_id: CompanyId,
}

fn accept_contract(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: SupplierArgs = req.args()?;
    to_json(&game.accept_contract(args.contract_id, args.company_id)?)
}

fn decline_contract(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: SupplierArgs = req.args()?;
    game.decline_contract(args.contract_id, args.company_id)?;
    Ok(json!({ "contract_id": args.contract_id, "declined": true }))
}

fn execute_contract(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: SupplierArgs = req.args()?;
    to_json(&game.execute_contract(args.contract_id, args.company_id)?)
}
