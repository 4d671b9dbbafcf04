//! The exchange: sell offers with escrowed purchase requests.
//!
//! ```text
//! active --accept--> pending --send_goods--> completed
//!   |                   '--deadline missed--> failed
//!   '--cancel--> rejected
//! ```
//!
//! The seller stakes nothing when listing. A buyer's payment (money or
//! barter units) is withheld when the request is placed and leaves escrow
//! exactly once: refunded on rejection, cancellation, acceptance of
//! another buyer, request expiry, a failed deal or deletion; delivered to
//! the seller on completion. Every movement is recorded in the game's
//! [`EscrowBook`](emporium_bank::EscrowBook).

use emporium_bank::{Asset, DealRef, EscrowFlow};
use emporium_types::{
    Company, CompanyId, DealType, Document, EventName, Exchange, ExchangeId, ExchangeStatus,
    PurchaseRequest, SessionId,
};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::error::GameError;
use crate::game::Game;

/// Turns a purchase request may wait on an active offer.
pub const REQUEST_TTL_TURNS: u32 = 3;

/// Reputation a seller loses for missing a delivery deadline.
pub const FAILED_DEAL_PENALTY: u32 = 10;

/// What the buyer pays for an offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangePrice {
    /// A sum of money.
    Money(i64),
    /// Units of another resource.
    Barter {
        /// Resource id.
        resource: String,
        /// Units.
        amount: u32,
    },
}

/// Optional narrowing for [`Game::exchanges`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeFilter {
    /// Only offers in this status.
    pub status: Option<ExchangeStatus>,
    /// Only offers by this seller.
    pub seller: Option<CompanyId>,
    /// Only offers of this resource.
    pub resource: Option<String>,
}

/// Escrowed asset and amount of one request on `offer`.
fn escrow_of(offer: &Exchange) -> (Asset, i64) {
    match (offer.deal_type, offer.barter_resource.as_ref()) {
        (DealType::Barter, Some(resource)) => (
            Asset::Resource(resource.clone()),
            i64::from(offer.barter_amount),
        ),
        _ => (Asset::Money, offer.price_money),
    }
}

impl Game {
    /// Offer by id.
    pub fn exchange(&self, id: ExchangeId) -> Result<Exchange, GameError> {
        self.store
            .get::<Exchange>(id)?
            .ok_or_else(|| GameError::not_found("exchange", id))
    }

    /// Offers of a session, ascending by id.
    pub fn exchanges(&self, session_id: &SessionId, filter: &ExchangeFilter) -> Result<Vec<Exchange>, GameError> {
        let mut query = Map::new();
        query.insert(String::from("session_id"), json!(session_id));
        if let Some(status) = filter.status {
            query.insert(String::from("status"), serde_json::to_value(status)?);
        }
        if let Some(seller) = filter.seller {
            query.insert(String::from("seller_company_id"), json!(seller));
        }
        if let Some(resource) = &filter.resource {
            query.insert(String::from("offer_resource"), json!(resource));
        }
        let mut offers: Vec<Exchange> = self.store.find_typed(&Value::Object(query))?;
        offers.sort_by_key(|o| o.id);
        Ok(offers)
    }

    /// List an offer.
    ///
    /// # Errors
    ///
    /// [`GameError::Validation`] for a zero amount, an unknown resource,
    /// stock the seller does not hold, or a malformed price.
    pub fn create_exchange(
        &mut self,
        seller: CompanyId,
        resource: &str,
        amount: u32,
        price: ExchangePrice,
    ) -> Result<Exchange, GameError> {
        let (company, session) = self.acting_company(seller)?;
        if amount == 0 {
            return Err(GameError::Validation(String::from("amount must be positive")));
        }
        if self.catalog.resource(resource).is_none() {
            return Err(GameError::Validation(format!("unknown resource {resource}")));
        }
        let held = company.resource_amount(resource);
        if held < amount {
            return Err(GameError::Validation(format!(
                "company {seller} holds {held} {resource}, offers {amount}"
            )));
        }
        let (deal_type, price_money, barter_resource, barter_amount) = match price {
            ExchangePrice::Money(money) if money > 0 => (DealType::Money, money, None, 0),
            ExchangePrice::Money(_) => {
                return Err(GameError::Validation(String::from("price must be positive")));
            }
            ExchangePrice::Barter {
                resource: wanted,
                amount: wanted_amount,
            } => {
                if self.catalog.resource(&wanted).is_none() {
                    return Err(GameError::Validation(format!("unknown resource {wanted}")));
                }
                if wanted == resource {
                    return Err(GameError::Validation(String::from(
                        "barter must ask for a different resource",
                    )));
                }
                if wanted_amount == 0 {
                    return Err(GameError::Validation(String::from(
                        "barter amount must be positive",
                    )));
                }
                (DealType::Barter, 0, Some(wanted), wanted_amount)
            }
        };

        let offer = Exchange {
            id: ExchangeId(self.store.next_id(Exchange::TABLE)?),
            session_id: session.session_id.clone(),
            seller_company_id: seller,
            buyer_company_id: None,
            deal_type,
            offer_resource: resource.to_owned(),
            offer_amount: amount,
            price_money,
            barter_resource,
            barter_amount,
            status: ExchangeStatus::Active,
            purchase_requests: Vec::new(),
            delivery_deadline_turn: None,
            goods_sent: false,
            created_turn: session.step,
        };
        self.save(&offer)?;
        info!(exchange_id = %offer.id, %seller, resource, amount, "offer listed");
        self.emit(EventName::ExchangeCreate, json!({ "exchange": offer }));
        Ok(offer)
    }

    /// Place an escrowed purchase request.
    ///
    /// # Errors
    ///
    /// - [`GameError::State`] unless the offer is active.
    /// - [`GameError::Validation`] for the seller itself, a second request
    ///   by the same buyer, or a buyer that cannot pay.
    pub fn buy_exchange(&mut self, id: ExchangeId, buyer: CompanyId) -> Result<Exchange, GameError> {
        let mut offer = self.exchange(id)?;
        if offer.status != ExchangeStatus::Active {
            return Err(GameError::State(format!("exchange {id} is not active")));
        }
        if offer.seller_company_id == buyer {
            return Err(GameError::Validation(String::from(
                "a seller cannot buy its own offer",
            )));
        }
        if offer.has_request_from(buyer) {
            return Err(GameError::Validation(format!(
                "company {buyer} already requested exchange {id}"
            )));
        }
        let (mut company, session) = self.acting_company(buyer)?;
        if company.session_id != offer.session_id {
            return Err(GameError::Validation(format!(
                "exchange {id} belongs to another session"
            )));
        }

        let (asset, amount) = escrow_of(&offer);
        match &asset {
            Asset::Money => self.debit_money(&mut company, amount)?,
            Asset::Resource(resource) => {
                let held = company.resource_amount(resource);
                if held < offer.barter_amount {
                    return Err(GameError::Validation(format!(
                        "company {buyer} holds {held} {resource}, needs {}",
                        offer.barter_amount
                    )));
                }
                self.remove_resource(&mut company, resource, offer.barter_amount)?;
            }
        }
        self.save(&company)?;
        self.escrow
            .record(DealRef::Exchange(id), buyer, asset, amount, EscrowFlow::Reserved);

        offer.purchase_requests.push(PurchaseRequest {
            company_id: buyer,
            created_turn: session.step,
        });
        self.save(&offer)?;
        self.emit(
            EventName::ExchangePurchaseRequest,
            json!({ "exchange_id": id, "company_id": buyer, "turn": session.step }),
        );
        Ok(offer)
    }

    /// Return one buyer's escrow.
    fn refund_request(&mut self, offer: &Exchange, buyer: CompanyId) -> Result<(), GameError> {
        let Some(mut company) = self.store.get::<Company>(buyer)? else {
            warn!(exchange_id = %offer.id, %buyer, "refund target is gone");
            return Ok(());
        };
        let (asset, amount) = escrow_of(offer);
        match &asset {
            Asset::Money => self.credit_money(&mut company, amount)?,
            Asset::Resource(resource) => {
                self.restore_resource(&mut company, resource, offer.barter_amount);
            }
        }
        self.save(&company)?;
        self.escrow
            .record(DealRef::Exchange(offer.id), buyer, asset, amount, EscrowFlow::Refunded);
        Ok(())
    }

    fn refund_all_requests(&mut self, offer: &mut Exchange) -> Result<(), GameError> {
        let requests = std::mem::take(&mut offer.purchase_requests);
        for request in requests {
            self.refund_request(offer, request.company_id)?;
        }
        Ok(())
    }

    fn sold_offer(&self, id: ExchangeId, seller: CompanyId) -> Result<Exchange, GameError> {
        let offer = self.exchange(id)?;
        if offer.seller_company_id != seller {
            return Err(GameError::Validation(format!(
                "company {seller} is not the seller of exchange {id}"
            )));
        }
        Ok(offer)
    }

    /// Accept one buyer. Every other request is refunded and the seller
    /// has until the end of the next turn to ship.
    pub fn accept_exchange(
        &mut self,
        id: ExchangeId,
        seller: CompanyId,
        buyer: CompanyId,
    ) -> Result<Exchange, GameError> {
        let mut offer = self.sold_offer(id, seller)?;
        let (_, session) = self.acting_company(seller)?;
        if offer.status != ExchangeStatus::Active {
            return Err(GameError::State(format!("exchange {id} is not active")));
        }
        if !offer.has_request_from(buyer) {
            return Err(GameError::not_found("purchase request from company", buyer));
        }
        let others: Vec<CompanyId> = offer
            .purchase_requests
            .iter()
            .map(|r| r.company_id)
            .filter(|c| *c != buyer)
            .collect();
        for other in others {
            self.refund_request(&offer, other)?;
        }
        let deadline = session.step.saturating_add(1);
        offer.purchase_requests.clear();
        offer.buyer_company_id = Some(buyer);
        offer.status = ExchangeStatus::Pending;
        offer.delivery_deadline_turn = Some(deadline);
        self.save(&offer)?;
        info!(exchange_id = %id, %buyer, deadline, "offer accepted");
        self.emit(
            EventName::ExchangeAccepted,
            json!({ "exchange_id": id, "buyer_company_id": buyer, "delivery_deadline_turn": deadline }),
        );
        Ok(offer)
    }

    /// Turn one buyer down.
    pub fn reject_exchange_request(
        &mut self,
        id: ExchangeId,
        seller: CompanyId,
        buyer: CompanyId,
    ) -> Result<Exchange, GameError> {
        let mut offer = self.sold_offer(id, seller)?;
        self.acting_company(seller)?;
        if offer.status != ExchangeStatus::Active {
            return Err(GameError::State(format!("exchange {id} is not active")));
        }
        if !offer.has_request_from(buyer) {
            return Err(GameError::not_found("purchase request from company", buyer));
        }
        self.refund_request(&offer, buyer)?;
        offer.purchase_requests.retain(|r| r.company_id != buyer);
        self.save(&offer)?;
        self.emit(
            EventName::ExchangeRejected,
            json!({ "exchange_id": id, "company_id": buyer }),
        );
        Ok(offer)
    }

    /// Withdraw an active offer, refunding every request.
    pub fn cancel_exchange(&mut self, id: ExchangeId, seller: CompanyId) -> Result<Exchange, GameError> {
        let mut offer = self.sold_offer(id, seller)?;
        self.acting_company(seller)?;
        if offer.status != ExchangeStatus::Active {
            return Err(GameError::State(format!("exchange {id} is not active")));
        }
        self.refund_all_requests(&mut offer)?;
        offer.status = ExchangeStatus::Rejected;
        self.save(&offer)?;
        self.emit(EventName::ExchangeCancelled, json!({ "exchange_id": id }));
        Ok(offer)
    }

    /// Ship the goods of a pending offer and complete the deal.
    ///
    /// # Errors
    ///
    /// - [`GameError::State`] unless pending, or when the seller no longer
    ///   holds the offered units.
    /// - [`GameError::Capacity`] when either warehouse cannot take its
    ///   side of the trade.
    pub fn send_exchange_goods(&mut self, id: ExchangeId, seller: CompanyId) -> Result<Exchange, GameError> {
        let mut offer = self.sold_offer(id, seller)?;
        self.acting_company(seller)?;
        if offer.status != ExchangeStatus::Pending {
            return Err(GameError::State(format!("exchange {id} is not pending")));
        }
        offer.goods_sent = true;
        self.complete_deal(&mut offer)?;
        Ok(offer)
    }

    fn complete_deal(&mut self, offer: &mut Exchange) -> Result<(), GameError> {
        let buyer_id = offer
            .buyer_company_id
            .ok_or_else(|| GameError::State(format!("exchange {} has no buyer", offer.id)))?;
        let mut seller = self.company(offer.seller_company_id)?;
        let mut buyer = self.company(buyer_id)?;

        let held = seller.resource_amount(&offer.offer_resource);
        if held < offer.offer_amount {
            return Err(GameError::State(format!(
                "seller holds {held} {}, owes {}",
                offer.offer_resource, offer.offer_amount
            )));
        }
        let buyer_free = self.free_space(&buyer);
        if buyer_free < offer.offer_amount {
            return Err(GameError::Capacity(format!(
                "warehouse of company {buyer_id} is full: {buyer_free} free, {} needed",
                offer.offer_amount
            )));
        }
        if offer.deal_type == DealType::Barter {
            let seller_free = self
                .free_space(&seller)
                .saturating_add(offer.offer_amount);
            if seller_free < offer.barter_amount {
                return Err(GameError::Capacity(format!(
                    "warehouse of company {} cannot take {} barter units",
                    seller.id, offer.barter_amount
                )));
            }
        }

        self.remove_resource(&mut seller, &offer.offer_resource, offer.offer_amount)?;
        self.add_resource(&mut buyer, &offer.offer_resource, offer.offer_amount)?;
        let (asset, amount) = escrow_of(offer);
        match &asset {
            Asset::Money => {
                self.credit_money(&mut seller, amount)?;
                seller.this_turn_income = seller.this_turn_income.saturating_add(amount);
            }
            Asset::Resource(resource) => {
                self.add_resource(&mut seller, resource, offer.barter_amount)?;
            }
        }
        self.save(&seller)?;
        self.save(&buyer)?;
        self.escrow
            .record(DealRef::Exchange(offer.id), seller.id, asset, amount, EscrowFlow::Delivered);

        offer.status = ExchangeStatus::Completed;
        self.save(offer)?;
        info!(exchange_id = %offer.id, seller = %seller.id, buyer = %buyer_id, "deal completed");
        self.emit(
            EventName::ExchangeCompleted,
            json!({
                "exchange_id": offer.id,
                "seller_company_id": seller.id,
                "buyer_company_id": buyer_id,
                "resource": offer.offer_resource,
                "amount": offer.offer_amount,
                "deal_type": offer.deal_type,
                "price_money": offer.price_money,
                "barter_resource": offer.barter_resource,
                "barter_amount": offer.barter_amount,
            }),
        );
        Ok(())
    }

    fn fail_deal(&mut self, offer: &mut Exchange) -> Result<(), GameError> {
        if let Some(buyer) = offer.buyer_company_id {
            self.refund_request(offer, buyer)?;
        }
        offer.status = ExchangeStatus::Failed;
        self.save(offer)?;
        if let Some(mut seller) = self.store.get::<Company>(offer.seller_company_id)? {
            self.remove_reputation(&mut seller, FAILED_DEAL_PENALTY)?;
            self.save(&seller)?;
        }
        info!(exchange_id = %offer.id, seller = %offer.seller_company_id, "deal failed");
        self.emit(
            EventName::ExchangeFailed,
            json!({
                "exchange_id": offer.id,
                "seller_company_id": offer.seller_company_id,
                "buyer_company_id": offer.buyer_company_id,
            }),
        );
        Ok(())
    }

    /// End-of-turn exchange maintenance: stale requests are refunded and
    /// pending offers past their deadline are completed or failed.
    pub(crate) fn expire_exchanges(&mut self, session_id: &SessionId, step: u32) -> Result<(), GameError> {
        for mut offer in self.exchanges(session_id, &ExchangeFilter::default())? {
            match offer.status {
                ExchangeStatus::Active => {
                    let (stale, fresh): (Vec<PurchaseRequest>, Vec<PurchaseRequest>) = offer
                        .purchase_requests
                        .iter()
                        .cloned()
                        .partition(|r| step.saturating_sub(r.created_turn) > REQUEST_TTL_TURNS);
                    if stale.is_empty() {
                        continue;
                    }
                    for request in &stale {
                        self.refund_request(&offer, request.company_id)?;
                        self.emit(
                            EventName::ExchangeRejected,
                            json!({
                                "exchange_id": offer.id,
                                "company_id": request.company_id,
                                "reason": "expired",
                            }),
                        );
                    }
                    offer.purchase_requests = fresh;
                    self.save(&offer)?;
                }
                ExchangeStatus::Pending => {
                    let overdue = offer.delivery_deadline_turn.is_some_and(|d| step > d);
                    if !overdue {
                        continue;
                    }
                    if offer.goods_sent {
                        if let Err(err) = self.complete_deal(&mut offer) {
                            warn!(exchange_id = %offer.id, error = %err, "shipped deal could not complete");
                            self.fail_deal(&mut offer)?;
                        }
                    } else {
                        self.fail_deal(&mut offer)?;
                    }
                }
                ExchangeStatus::Completed | ExchangeStatus::Rejected | ExchangeStatus::Failed => {}
            }
        }
        Ok(())
    }

    /// Remove an offer, refunding whatever it still holds.
    pub fn delete_exchange(&mut self, id: ExchangeId, seller: CompanyId) -> Result<(), GameError> {
        let offer = self.sold_offer(id, seller)?;
        self.live_session(&self.company(seller)?)?;
        self.remove_exchange(offer)
    }

    fn remove_exchange(&mut self, mut offer: Exchange) -> Result<(), GameError> {
        match offer.status {
            ExchangeStatus::Active => self.refund_all_requests(&mut offer)?,
            ExchangeStatus::Pending => {
                if let Some(buyer) = offer.buyer_company_id {
                    self.refund_request(&offer, buyer)?;
                }
            }
            ExchangeStatus::Completed | ExchangeStatus::Rejected | ExchangeStatus::Failed => {}
        }
        self.store.remove(&offer)?;
        self.emit(EventName::ExchangeDeleted, json!({ "exchange_id": offer.id }));
        Ok(())
    }

    /// Detach `company` from an offer before the company is deleted.
    pub(crate) fn dissolve_exchange(&mut self, mut offer: Exchange, company: CompanyId) -> Result<(), GameError> {
        if offer.seller_company_id == company {
            return self.remove_exchange(offer);
        }
        match offer.status {
            ExchangeStatus::Active if offer.has_request_from(company) => {
                self.refund_request(&offer, company)?;
                offer.purchase_requests.retain(|r| r.company_id != company);
                self.save(&offer)?;
            }
            ExchangeStatus::Pending if offer.buyer_company_id == Some(company) => {
                self.refund_request(&offer, company)?;
                offer.status = ExchangeStatus::Rejected;
                self.save(&offer)?;
                self.emit(EventName::ExchangeCancelled, json!({ "exchange_id": offer.id }));
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::indexing_slicing)]

    use super::*;
    use crate::testing::TestGame;

    fn money_offer(t: &mut TestGame, seller: CompanyId, price: i64) -> ExchangeId {
        t.game
            .create_exchange(seller, "wood", 5, ExchangePrice::Money(price))
            .unwrap()
            .id
    }

    #[test]
    fn listing_is_validated_without_side_effects() {
        let mut t = TestGame::new();
        let (session, ids) = t.playing(1);
        let g = &mut t.game;
        let zero = g.create_exchange(ids[0], "wood", 0, ExchangePrice::Money(10));
        assert_eq!(zero.unwrap_err().kind(), "validation");
        let short = g.create_exchange(ids[0], "wood", 6, ExchangePrice::Money(10));
        assert_eq!(short.unwrap_err().kind(), "validation");
        let free = g.create_exchange(ids[0], "wood", 1, ExchangePrice::Money(0));
        assert_eq!(free.unwrap_err().kind(), "validation");
        let same = g.create_exchange(
            ids[0],
            "wood",
            1,
            ExchangePrice::Barter {
                resource: String::from("wood"),
                amount: 1,
            },
        );
        assert_eq!(same.unwrap_err().kind(), "validation");
        assert!(g.exchanges(&session, &ExchangeFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn requests_escrow_money_once_per_buyer() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(2);
        let id = money_offer(&mut t, ids[0], 400);
        assert_eq!(t.game.buy_exchange(id, ids[0]).unwrap_err().kind(), "validation");
        t.game.buy_exchange(id, ids[1]).unwrap();
        assert_eq!(t.game.company(ids[1]).unwrap().balance, 4600);
        assert_eq!(t.game.buy_exchange(id, ids[1]).unwrap_err().kind(), "validation");
        assert_eq!(
            t.game.escrow().outstanding(DealRef::Exchange(id)).get(&Asset::Money),
            Some(&400)
        );
    }

    #[test]
    fn insufficient_funds_leave_no_escrow() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(2);
        let id = money_offer(&mut t, ids[0], 400);
        t.set_balance(ids[1], 399);
        assert_eq!(t.game.buy_exchange(id, ids[1]).unwrap_err().kind(), "validation");
        assert_eq!(t.game.company(ids[1]).unwrap().balance, 399);
        assert!(t.game.exchange(id).unwrap().purchase_requests.is_empty());
        assert!(t.game.escrow().outstanding(DealRef::Exchange(id)).is_empty());
    }

    #[test]
    fn accepting_one_buyer_refunds_the_others() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(3);
        let id = money_offer(&mut t, ids[0], 400);
        t.game.buy_exchange(id, ids[1]).unwrap();
        t.game.buy_exchange(id, ids[2]).unwrap();

        let offer = t.game.accept_exchange(id, ids[0], ids[2]).unwrap();
        assert_eq!(offer.status, ExchangeStatus::Pending);
        assert_eq!(offer.delivery_deadline_turn, Some(2));
        assert!(offer.purchase_requests.is_empty());
        assert_eq!(t.game.company(ids[1]).unwrap().balance, 5000);
        assert_eq!(t.game.company(ids[2]).unwrap().balance, 4600);
    }

    #[test]
    fn barter_deal_swaps_resources() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(2);
        t.stock(ids[1], "planks", 4);
        let id = t
            .game
            .create_exchange(
                ids[0],
                "wood",
                5,
                ExchangePrice::Barter {
                    resource: String::from("planks"),
                    amount: 3,
                },
            )
            .unwrap()
            .id;
        t.game.buy_exchange(id, ids[1]).unwrap();
        assert_eq!(t.game.company(ids[1]).unwrap().resource_amount("planks"), 1);
        t.game.accept_exchange(id, ids[0], ids[1]).unwrap();
        let done = t.game.send_exchange_goods(id, ids[0]).unwrap();
        assert_eq!(done.status, ExchangeStatus::Completed);

        let seller = t.game.company(ids[0]).unwrap();
        let buyer = t.game.company(ids[1]).unwrap();
        assert_eq!(seller.resource_amount("wood"), 0);
        assert_eq!(seller.resource_amount("planks"), 3);
        assert_eq!(buyer.resource_amount("wood"), 10);
        assert_eq!(t.game.escrow().verify_resolved(DealRef::Exchange(id)), Ok(()));
    }

    #[test]
    fn cancel_and_reject_refund() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(3);
        let id = money_offer(&mut t, ids[0], 100);
        t.game.buy_exchange(id, ids[1]).unwrap();
        t.game.buy_exchange(id, ids[2]).unwrap();
        t.game.reject_exchange_request(id, ids[0], ids[1]).unwrap();
        assert_eq!(t.game.company(ids[1]).unwrap().balance, 5000);
        let offer = t.game.cancel_exchange(id, ids[0]).unwrap();
        assert_eq!(offer.status, ExchangeStatus::Rejected);
        assert_eq!(t.game.company(ids[2]).unwrap().balance, 5000);
        assert_eq!(t.game.escrow().verify_resolved(DealRef::Exchange(id)), Ok(()));
        assert_eq!(t.game.buy_exchange(id, ids[1]).unwrap_err().kind(), "state");
    }

    #[test]
    fn missed_deadline_fails_the_deal() {
        let mut t = TestGame::new();
        let (session, ids) = t.playing(2);
        let id = money_offer(&mut t, ids[0], 100);
        t.game.buy_exchange(id, ids[1]).unwrap();
        t.game.accept_exchange(id, ids[0], ids[1]).unwrap();

        t.game.expire_exchanges(&session, 2).unwrap();
        assert_eq!(t.game.exchange(id).unwrap().status, ExchangeStatus::Pending);
        t.game.expire_exchanges(&session, 3).unwrap();
        assert_eq!(t.game.exchange(id).unwrap().status, ExchangeStatus::Failed);
        assert_eq!(t.game.company(ids[1]).unwrap().balance, 5000);
        assert_eq!(t.game.company(ids[0]).unwrap().reputation, 90);
        assert_eq!(t.game.escrow().verify_resolved(DealRef::Exchange(id)), Ok(()));
    }

    #[test]
    fn stale_requests_are_purged() {
        let mut t = TestGame::new();
        let (session, ids) = t.playing(2);
        let id = money_offer(&mut t, ids[0], 100);
        t.game.buy_exchange(id, ids[1]).unwrap();
        t.game.expire_exchanges(&session, 4).unwrap();
        assert_eq!(t.game.exchange(id).unwrap().purchase_requests.len(), 1);
        t.game.expire_exchanges(&session, 5).unwrap();
        let offer = t.game.exchange(id).unwrap();
        assert!(offer.purchase_requests.is_empty());
        assert_eq!(offer.status, ExchangeStatus::Active);
        assert_eq!(t.game.company(ids[1]).unwrap().balance, 5000);
    }

    #[test]
    fn deleting_a_buyer_refunds_it() {
        let mut t = TestGame::new();
        let (session, ids) = t.playing(2);
        let id = money_offer(&mut t, ids[0], 100);
        t.game.buy_exchange(id, ids[1]).unwrap();
        t.game.delete_company(ids[1]).unwrap();
        assert!(t.game.exchange(id).unwrap().purchase_requests.is_empty());
        assert_eq!(t.game.escrow().verify_resolved(DealRef::Exchange(id)), Ok(()));

        t.game.delete_exchange(id, ids[0]).unwrap();
        assert!(t.game.exchanges(&session, &ExchangeFilter::default()).unwrap().is_empty());
    }
}
