//! Company commands: lifecycle, membership, improvements and banking.

use emporium_game::{Game, GameError};
use emporium_types::{CompanyId, ImprovementKind, SessionId, UserId};
use serde::Deserialize;
use serde_json::{Value, json};

use super::to_json;
use crate::dispatcher::{Access, Dispatcher, Request};

pub(super) fn register(d: &mut Dispatcher) {
    d.register("create-company", Access::Mutate, create_company);
    d.register("get-company", Access::Read, get_company);
    d.register("get-companies", Access::Read, get_companies);
    d.register("set-company-position", Access::Mutate, set_position);
    d.register("update-company-improve", Access::Mutate, improve);
    d.register("update-company-add-user", Access::Mutate, add_user);
    d.register("update-company-left-user", Access::Mutate, left_user);
    d.register("company-take-credit", Access::Mutate, take_credit);
    d.register("company-pay-credit", Access::Mutate, pay_credit);
    d.register("company-take-deposit", Access::Mutate, take_deposit);
    d.register("company-withdraw-deposit", Access::Mutate, withdraw_deposit);
    d.register("company-pay-taxes", Access::Mutate, pay_taxes);
    d.register("delete-company", Access::Mutate, delete_company);
}

#[derive(Debug, Deserialize)]
struct CompanyArgs {
    #[serde(alias = "id")]
    company_id: CompanyId,
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    session_id: SessionId,
    name: String,
    who_create: Option<UserId>,
}

fn create_company(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: CreateArgs = req.args()?;
    to_json(&game.create_company(&args.session_id, &args.name, args.who_create)?)
}

fn get_company(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: CompanyArgs = req.args()?;
    to_json(&game.company(args.company_id)?)
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    session_id: Option<SessionId>,
    in_prison: Option<bool>,
    cell_position: Option<String>,
}

fn get_companies(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: ListArgs = req.args()?;
    let companies: Vec<_> = game
        .companies(args.session_id.as_ref())?
        .into_iter()
        .filter(|c| args.in_prison.is_none_or(|p| c.in_prison == p))
        .filter(|c| {
            args.cell_position
                .as_deref()
                .is_none_or(|pos| c.cell_position.as_deref() == Some(pos))
        })
        .collect();
    to_json(&companies)
}

#[derive(Debug, Deserialize)]
struct PositionArgs {
    company_id: CompanyId,
    x: u32,
    y: u32,
}

fn set_position(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: PositionArgs = req.args()?;
    to_json(&game.set_position(args.company_id, args.x, args.y)?)
}

#[derive(Debug, Deserialize)]
struct ImproveArgs {
    company_id: CompanyId,
    improvement_type: ImprovementKind,
}

fn improve(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: ImproveArgs = req.args()?;
    to_json(&game.upgrade_improvement(args.company_id, args.improvement_type)?)
}

#[derive(Debug, Deserialize)]
struct JoinArgs {
    user_id: UserId,
    session_id: SessionId,
    secret_code: u32,
}

fn add_user(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: JoinArgs = req.args()?;
    to_json(&game.add_user_to_company(args.user_id, &args.session_id, args.secret_code)?)
}

#[derive(Debug, Deserialize)]
struct LeaveArgs {
    user_id: UserId,
    session_id: SessionId,
}

fn left_user(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: LeaveArgs = req.args()?;
    game.leave_company(args.user_id, &args.session_id)?;
    Ok(json!({ "user_id": args.user_id, "session_id": args.session_id }))
}

#[derive(Debug, Deserialize)]
struct TermArgs {
    company_id: CompanyId,
    amount: i64,
    period: u32,
}

fn take_credit(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: TermArgs = req.args()?;
    to_json(&game.take_credit(args.company_id, args.amount, args.period)?)
}

fn take_deposit(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: TermArgs = req.args()?;
    to_json(&game.take_deposit(args.company_id, args.amount, args.period)?)
}

#[derive(Debug, Deserialize)]
struct PayCreditArgs {
    company_id: CompanyId,
    credit_index: usize,
    amount: i64,
}

fn pay_credit(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: PayCreditArgs = req.args()?;
    to_json(&game.pay_credit(args.company_id, args.credit_index, args.amount)?)
}

#[derive(Debug, Deserialize)]
struct WithdrawArgs {
    company_id: CompanyId,
    deposit_index: usize,
}

fn withdraw_deposit(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: WithdrawArgs = req.args()?;
    to_json(&game.withdraw_deposit(args.company_id, args.deposit_index)?)
}

#[derive(Debug, Deserialize)]
struct TaxArgs {
    company_id: CompanyId,
    amount: i64,
}

fn pay_taxes(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: TaxArgs = req.args()?;
    to_json(&game.pay_taxes(args.company_id, args.amount)?)
}

fn delete_company(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: CompanyArgs = req.args()?;
    game.delete_company(args.company_id)?;
    Ok(json!({ "company_id": args.company_id, "deleted": true }))
}
