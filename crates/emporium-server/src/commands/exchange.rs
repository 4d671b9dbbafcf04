//! Exchange commands.
//!
//! `company_id` is always the acting company: the seller for offer
//! management, the buyer for `buy-exchange-offer`.

use emporium_game::{ExchangeFilter, ExchangePrice, Game, GameError};
use emporium_types::{CompanyId, DealType, ExchangeId, ExchangeStatus, SessionId};
use serde::Deserialize;
use serde_json::{Value, json};

use super::to_json;
use crate::dispatcher::{Access, Dispatcher, Request};

pub(super) fn register(d: &mut Dispatcher) {
    d.register("get-exchanges", Access::Read, get_exchanges);
    d.register("get-exchange", Access::Read, get_exchange);
    d.register("create-exchange-offer", Access::Mutate, create_offer);
    d.register("buy-exchange-offer", Access::Mutate, buy_offer);
    d.register("accept-exchange-request", Access::Mutate, accept_request);
    d.register("reject-exchange-request", Access::Mutate, reject_request);
    d.register("cancel-exchange-offer", Access::Mutate, cancel_offer);
    d.register("send-exchange-goods", Access::Mutate, send_goods);
    d.register("delete-exchange-offer", Access::Mutate, delete_offer);
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    session_id: SessionId,
    status: Option<ExchangeStatus>,
    #[serde(alias = "company_id")]
    seller_id: Option<CompanyId>,
    sell_resource: Option<String>,
}

fn get_exchanges(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: ListArgs = req.args()?;
    let filter = ExchangeFilter {
        status: args.status,
        seller: args.seller_id,
        resource: args.sell_resource,
    };
    to_json(&game.exchanges(&args.session_id, &filter)?)
}

#[derive(Debug, Deserialize)]
struct OfferArgs {
    offer_id: ExchangeId,
}

fn get_exchange(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: OfferArgs = req.args()?;
    to_json(&game.exchange(args.offer_id)?)
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    company_id: CompanyId,
    sell_resource: String,
    sell_amount: u32,
    #[serde(default)]
    offer_type: DealType,
    price: Option<i64>,
    barter_resource: Option<String>,
    barter_amount: Option<u32>,
}

impl CreateArgs {
    fn price(&self) -> Result<ExchangePrice, GameError> {
        match self.offer_type {
            DealType::Money => self
                .price
                .map(ExchangePrice::Money)
                .ok_or_else(|| GameError::Validation(String::from("money offers need a price"))),
            DealType::Barter => match (&self.barter_resource, self.barter_amount) {
                (Some(resource), Some(amount)) => Ok(ExchangePrice::Barter {
                    resource: resource.clone(),
                    amount,
                }),
                _ => Err(GameError::Validation(String::from(
                    "barter offers need barter_resource and barter_amount",
                ))),
            },
        }
    }
}

fn create_offer(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: CreateArgs = req.args()?;
    let price = args.price()?;
    to_json(&game.create_exchange(args.company_id, &args.sell_resource, args.sell_amount, price)?)
}

#[derive(Debug, Deserialize)]
struct BuyArgs {
    offer_id: ExchangeId,
    #[serde(alias = "buyer_id")]
    company_id: CompanyId,
}

fn buy_offer(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: BuyArgs = req.args()?;
    to_json(&game.buy_exchange(args.offer_id, args.company_id)?)
}

#[derive(Debug, Deserialize)]
struct RequestArgs {
    offer_id: ExchangeId,
    company_id: CompanyId,
    buyer_id: CompanyId,
}

fn accept_request(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: RequestArgs = req.args()?;
    to_json(&game.accept_exchange(args.offer_id, args.company_id, args.buyer_id)?)
}

fn reject_request(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: RequestArgs = req.args()?;
    to_json(&game.reject_exchange_request(args.offer_id, args.company_id, args.buyer_id)?)
}

#[derive(Debug, Deserialize)]
struct SellerArgs {
    offer_id: ExchangeId,
    company_id: CompanyId,
}

fn cancel_offer(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: SellerArgs = req.args()?;
    to_json(&game.cancel_exchange(args.offer_id, args.company_id)?)
}

fn send_goods(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: SellerArgs = req.args()?;
    to_json(&game.send_exchange_goods(args.offer_id, args.company_id)?)
}

fn delete_offer(game: &mut Game, req: &Request<'_>) -> Result<Value, GameError> {
    let args: SellerArgs = req.args()?;
    game.delete_exchange(args.offer_id, args.company_id)?;
    Ok(json!({ "offer_id": args.offer_id, "deleted": true }))
}
