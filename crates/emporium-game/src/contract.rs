//! Bilateral supply contracts.
//!
//! A customer proposes; the supplier accepts, which escrows the whole
//! payment from the customer. The supplier then calls
//! [`Game::execute_contract`] once per turn. The turn pipeline reviews
//! each supplier's contracts:
//!
//! - an unaccepted proposal older than its turn expires;
//! - a turn without a delivery costs `reputation.contract.lost`;
//! - once `duration_turns` have passed the whole escrow goes to the
//!   supplier, who also gains `reputation.contract.gained`.
//!
//! Delivering every unit early settles the contract on the spot.

use emporium_bank::{Asset, DealRef, EscrowFlow};
use emporium_types::{Company, CompanyId, Contract, ContractId, Document, EventName, ImprovementKind};
use serde_json::json;
use tracing::{debug, info};

use crate::error::GameError;
use crate::events::ActiveEffects;
use crate::game::Game;

impl Game {
    /// Contract by id.
    pub fn contract(&self, id: ContractId) -> Result<Contract, GameError> {
        self.store
            .get::<Contract>(id)?
            .ok_or_else(|| GameError::not_found("contract", id))
    }

    /// Contracts where `company` is supplier or customer, ascending by id.
    pub fn company_contracts(&self, company: CompanyId) -> Result<Vec<Contract>, GameError> {
        let mut contracts: Vec<Contract> = self
            .store
            .find_typed(&json!({ "supplier_company_id": company }))?;
        let as_customer: Vec<Contract> = self
            .store
            .find_typed(&json!({ "customer_company_id": company }))?;
        contracts.extend(as_customer);
        contracts.sort_by_key(|c| c.id);
        contracts.dedup_by_key(|c| c.id);
        Ok(contracts)
    }

    fn require_contract_slot(&self, company: &Company, effects: &ActiveEffects) -> Result<(), GameError> {
        let limit = self
            .catalog
            .contracts_limit(company.improvement_level(ImprovementKind::Contracts))
            .saturating_sub(effects.contracts_decrease());
        let active = self
            .company_contracts(company.id)?
            .iter()
            .filter(|c| c.accepted)
            .count();
        if active >= usize::try_from(limit).unwrap_or(usize::MAX) {
            return Err(GameError::Capacity(format!(
                "company {} has no free contract slot ({active} of {limit})",
                company.id
            )));
        }
        Ok(())
    }

    /// Propose a contract. The customer pays nothing until acceptance.
    ///
    /// # Errors
    ///
    /// - [`GameError::Validation`] for an unknown resource, a zero amount,
    ///   duration or payment, or a supplier in another session.
    /// - [`GameError::State`] outside the play stages or from prison.
    pub fn create_contract(
        &mut self,
        customer: CompanyId,
        supplier: CompanyId,
        resource: &str,
        amount_per_turn: u32,
        duration_turns: u32,
        payment_amount: i64,
    ) -> Result<Contract, GameError> {
        let (buyer, session) = self.acting_company(customer)?;
        if customer == supplier {
            return Err(GameError::Validation(String::from(
                "a company cannot contract with itself",
            )));
        }
        let seller = self.company(supplier)?;
        if seller.session_id != buyer.session_id {
            return Err(GameError::Validation(format!(
                "company {supplier} plays in another session"
            )));
        }
        if self.catalog.resource(resource).is_none() {
            return Err(GameError::Validation(format!("unknown resource {resource}")));
        }
        if amount_per_turn == 0 || duration_turns == 0 {
            return Err(GameError::Validation(String::from(
                "amount and duration must be positive",
            )));
        }
        if payment_amount <= 0 {
            return Err(GameError::Validation(String::from("payment must be positive")));
        }

        let contract = Contract {
            id: ContractId(self.store.next_id(Contract::TABLE)?),
            session_id: session.session_id.clone(),
            supplier_company_id: supplier,
            customer_company_id: customer,
            resource: resource.to_owned(),
            amount_per_turn,
            duration_turns,
            payment_amount,
            accepted: false,
            successful_deliveries: 0,
            delivered_this_turn: false,
            turns_passed: 0,
            created_turn: session.step,
        };
        self.save(&contract)?;
        info!(contract_id = %contract.id, %customer, %supplier, resource, "contract proposed");
        self.emit(EventName::ContractCreated, json!({ "contract": contract }));
        Ok(contract)
    }

    fn supplied_contract(&self, id: ContractId, supplier: CompanyId) -> Result<Contract, GameError> {
        let contract = self.contract(id)?;
        if contract.supplier_company_id != supplier {
            return Err(GameError::Validation(format!(
                "company {supplier} is not the supplier of contract {id}"
            )));
        }
        Ok(contract)
    }

    /// Accept a proposal as its supplier and escrow the customer's payment.
    ///
    /// # Errors
    ///
    /// - [`GameError::Capacity`] when either party has no free slot.
    /// - [`GameError::Validation`] when the customer cannot pay.
    pub fn accept_contract(&mut self, id: ContractId, supplier: CompanyId) -> Result<Contract, GameError> {
        let mut contract = self.supplied_contract(id, supplier)?;
        let (seller, session) = self.acting_company(supplier)?;
        if contract.accepted {
            return Err(GameError::State(format!("contract {id} is already accepted")));
        }
        let mut buyer = self.company(contract.customer_company_id)?;
        let effects = self.active_effects(&session);
        self.require_contract_slot(&seller, &effects)?;
        self.require_contract_slot(&buyer, &effects)?;

        self.debit_money(&mut buyer, contract.payment_amount)?;
        self.save(&buyer)?;
        self.escrow.record(
            DealRef::Contract(id),
            buyer.id,
            Asset::Money,
            contract.payment_amount,
            EscrowFlow::Reserved,
        );
        contract.accepted = true;
        self.save(&contract)?;
        info!(contract_id = %id, escrow = contract.payment_amount, "contract accepted");
        self.emit(EventName::ContractAccepted, json!({ "contract": contract }));
        Ok(contract)
    }

    /// Decline a proposal as its supplier.
    pub fn decline_contract(&mut self, id: ContractId, supplier: CompanyId) -> Result<(), GameError> {
        let contract = self.supplied_contract(id, supplier)?;
        self.live_session(&self.company(supplier)?)?;
        if contract.accepted {
            return Err(GameError::State(format!(
                "contract {id} is already accepted"
            )));
        }
        self.store.remove(&contract)?;
        self.emit(
            EventName::ContractDeclined,
            json!({ "contract_id": id, "supplier_company_id": supplier }),
        );
        Ok(())
    }

    /// Deliver this turn's units.
    ///
    /// # Errors
    ///
    /// - [`GameError::State`] before acceptance, on a second delivery in
    ///   the same turn, or when the supplier lacks stock.
    /// - [`GameError::Capacity`] when the customer's warehouse is full.
    pub fn execute_contract(&mut self, id: ContractId, supplier: CompanyId) -> Result<Contract, GameError> {
        let mut contract = self.supplied_contract(id, supplier)?;
        let (mut seller, _) = self.acting_company(supplier)?;
        if !contract.accepted {
            return Err(GameError::State(format!("contract {id} is not accepted")));
        }
        if contract.delivered_this_turn {
            return Err(GameError::State(format!(
                "contract {id} was already delivered this turn"
            )));
        }
        let mut buyer = self.company(contract.customer_company_id)?;
        let free = self.free_space(&buyer);
        if free < contract.amount_per_turn {
            return Err(GameError::Capacity(format!(
                "warehouse of company {} is full: {free} free, {} needed",
                buyer.id, contract.amount_per_turn
            )));
        }
        self.remove_resource(&mut seller, &contract.resource, contract.amount_per_turn)?;
        self.add_resource(&mut buyer, &contract.resource, contract.amount_per_turn)?;
        contract.successful_deliveries = contract.successful_deliveries.saturating_add(1);
        contract.delivered_this_turn = true;
        debug!(contract_id = %id, deliveries = contract.successful_deliveries, "contract delivery");
        self.emit(
            EventName::ContractExecuted,
            json!({
                "contract_id": id,
                "supplier_company_id": seller.id,
                "customer_company_id": buyer.id,
                "resource": contract.resource,
                "amount": contract.amount_per_turn,
                "deliveries": contract.successful_deliveries,
            }),
        );

        if contract.successful_deliveries >= contract.duration_turns {
            self.save(&buyer)?;
            self.settle_contract(&contract, &mut seller)?;
            self.save(&seller)?;
        } else {
            self.save(&seller)?;
            self.save(&buyer)?;
            self.save(&contract)?;
        }
        Ok(contract)
    }

    /// Pay the escrowed payment to the supplier and remove the contract.
    ///
    /// Missed turns were already charged in reputation; the payout itself
    /// does not depend on the delivery count.
    fn settle_contract(&mut self, contract: &Contract, supplier: &mut Company) -> Result<(), GameError> {
        let payout = contract.payment_amount;
        if payout > 0 {
            self.credit_money(supplier, payout)?;
            supplier.this_turn_income = supplier.this_turn_income.saturating_add(payout);
            self.escrow.record(
                DealRef::Contract(contract.id),
                supplier.id,
                Asset::Money,
                payout,
                EscrowFlow::Delivered,
            );
        }
        let gained = self.catalog.reputation.contract.gained;
        self.add_reputation(supplier, gained);
        self.store.remove(contract)?;
        info!(
            contract_id = %contract.id,
            payout,
            deliveries = contract.successful_deliveries,
            duration = contract.duration_turns,
            "contract settled"
        );
        self.emit(
            EventName::ContractCompleted,
            json!({
                "contract_id": contract.id,
                "supplier_company_id": contract.supplier_company_id,
                "customer_company_id": contract.customer_company_id,
                "deliveries": contract.successful_deliveries,
                "payout": payout,
            }),
        );
        Ok(())
    }

    /// Contract step of the turn pipeline, run for each supplier.
    pub(crate) fn run_contracts(&mut self, supplier: &mut Company, step: u32) -> Result<(), GameError> {
        let own: Vec<Contract> = self
            .store
            .find_typed(&json!({ "supplier_company_id": supplier.id }))?;
        for mut contract in own {
            if !contract.accepted {
                if contract.created_turn < step {
                    self.store.remove(&contract)?;
                    self.emit(
                        EventName::ContractExpired,
                        json!({
                            "contract_id": contract.id,
                            "customer_company_id": contract.customer_company_id,
                            "supplier_company_id": contract.supplier_company_id,
                        }),
                    );
                }
                continue;
            }

            if !contract.delivered_this_turn {
                let lost = self.catalog.reputation.contract.lost;
                self.remove_reputation(supplier, lost)?;
                self.emit(
                    EventName::ContractDeliveryMissed,
                    json!({
                        "contract_id": contract.id,
                        "supplier_company_id": supplier.id,
                        "reputation_lost": lost,
                    }),
                );
            }
            contract.turns_passed = contract.turns_passed.saturating_add(1);
            if contract.turns_passed >= contract.duration_turns {
                self.settle_contract(&contract, supplier)?;
            } else {
                contract.delivered_this_turn = false;
                self.save(&contract)?;
            }
        }
        Ok(())
    }

    /// Refund any escrow and remove a contract whose party is going away.
    pub(crate) fn dissolve_contract(&mut self, contract: Contract) -> Result<(), GameError> {
        if contract.accepted {
            let mut customer = self.company(contract.customer_company_id)?;
            self.credit_money(&mut customer, contract.payment_amount)?;
            self.save(&customer)?;
            self.escrow.record(
                DealRef::Contract(contract.id),
                customer.id,
                Asset::Money,
                contract.payment_amount,
                EscrowFlow::Refunded,
            );
        }
        self.store.remove(&contract)?;
        self.emit(
            EventName::ContractExpired,
            json!({
                "contract_id": contract.id,
                "customer_company_id": contract.customer_company_id,
                "supplier_company_id": contract.supplier_company_id,
                "reason": "dissolved",
            }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::indexing_slicing)]

    use super::*;
    use crate::testing::TestGame;

    /// Two playing companies; the first supplies wood to the second.
    fn proposal(t: &mut TestGame, duration: u32) -> (Vec<CompanyId>, Contract) {
        let (_, ids) = t.playing(2);
        let contract = t
            .game
            .create_contract(ids[1], ids[0], "wood", 2, duration, 300)
            .unwrap();
        (ids, contract)
    }

    #[test]
    fn proposals_are_validated() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(2);
        let g = &mut t.game;
        assert_eq!(g.create_contract(ids[0], ids[0], "wood", 1, 1, 10).unwrap_err().kind(), "validation");
        assert_eq!(g.create_contract(ids[1], ids[0], "gold", 1, 1, 10).unwrap_err().kind(), "validation");
        assert_eq!(g.create_contract(ids[1], ids[0], "wood", 0, 1, 10).unwrap_err().kind(), "validation");
        assert_eq!(g.create_contract(ids[1], ids[0], "wood", 1, 1, 0).unwrap_err().kind(), "validation");
        assert_eq!(g.create_contract(ids[1], CompanyId(99), "wood", 1, 1, 10).unwrap_err().kind(), "not_found");
    }

    #[test]
    fn acceptance_escrows_the_payment() {
        let mut t = TestGame::new();
        let (ids, contract) = proposal(&mut t, 2);
        let err = t.game.accept_contract(contract.id, ids[1]).unwrap_err();
        assert_eq!(err.kind(), "validation");

        let accepted = t.game.accept_contract(contract.id, ids[0]).unwrap();
        assert!(accepted.accepted);
        assert_eq!(t.game.company(ids[1]).unwrap().balance, 4700);
        let held = t.game.escrow().outstanding(DealRef::Contract(contract.id));
        assert_eq!(held.get(&Asset::Money), Some(&300));
        assert_eq!(t.game.accept_contract(contract.id, ids[0]).unwrap_err().kind(), "state");
        assert_eq!(t.game.decline_contract(contract.id, ids[0]).unwrap_err().kind(), "state");
    }

    #[test]
    fn poor_customer_cannot_be_accepted() {
        let mut t = TestGame::new();
        let (ids, contract) = proposal(&mut t, 2);
        t.set_balance(ids[1], 100);
        let err = t.game.accept_contract(contract.id, ids[0]).unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(!t.game.contract(contract.id).unwrap().accepted);
    }

    #[test]
    fn slots_are_capped_by_improvement_level() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(2);
        for _ in 0..2 {
            let c = t.game.create_contract(ids[1], ids[0], "wood", 1, 3, 10).unwrap();
            t.game.accept_contract(c.id, ids[0]).unwrap();
        }
        let c = t.game.create_contract(ids[1], ids[0], "wood", 1, 3, 10).unwrap();
        assert_eq!(t.game.accept_contract(c.id, ids[0]).unwrap_err().kind(), "capacity");
    }

    #[test]
    fn once_per_turn_delivery_and_early_full_settlement() {
        let mut t = TestGame::new();
        let (ids, contract) = proposal(&mut t, 1);
        t.game.accept_contract(contract.id, ids[0]).unwrap();
        t.game.drain_events();

        t.game.execute_contract(contract.id, ids[0]).unwrap();
        assert!(t.game.contract(contract.id).is_err());
        let supplier = t.game.company(ids[0]).unwrap();
        assert_eq!(supplier.resource_amount("wood"), 3);
        assert_eq!(supplier.balance, 5300);
        assert_eq!(supplier.reputation, 105);
        assert_eq!(t.game.company(ids[1]).unwrap().resource_amount("wood"), 7);
        assert_eq!(t.game.escrow().verify_resolved(DealRef::Contract(contract.id)), Ok(()));
        let names: Vec<EventName> = t.game.drain_events().into_iter().map(|e| e.name).collect();
        assert!(names.contains(&EventName::ContractExecuted));
        assert!(names.contains(&EventName::ContractCompleted));
    }

    #[test]
    fn second_delivery_in_a_turn_is_refused() {
        let mut t = TestGame::new();
        let (ids, contract) = proposal(&mut t, 3);
        t.game.accept_contract(contract.id, ids[0]).unwrap();
        t.game.execute_contract(contract.id, ids[0]).unwrap();
        let err = t.game.execute_contract(contract.id, ids[0]).unwrap_err();
        assert_eq!(err.kind(), "state");
    }

    #[test]
    fn duration_end_pays_the_full_payment_after_misses() {
        let mut t = TestGame::new();
        let (ids, contract) = proposal(&mut t, 2);
        t.game.accept_contract(contract.id, ids[0]).unwrap();
        t.game.execute_contract(contract.id, ids[0]).unwrap();

        let mut supplier = t.game.company(ids[0]).unwrap();
        for step in 2..=3 {
            t.game.run_contracts(&mut supplier, step).unwrap();
        }
        assert!(t.game.contract(contract.id).is_err());
        // One miss at 10, then the completion bonus of 5.
        assert_eq!(supplier.reputation, 95);
        assert_eq!(supplier.balance, 5300);
        assert_eq!(t.game.company(ids[1]).unwrap().balance, 4700);
        assert_eq!(t.game.escrow().verify_resolved(DealRef::Contract(contract.id)), Ok(()));
    }

    #[test]
    fn every_missed_turn_costs_reputation() {
        let mut t = TestGame::new();
        let (ids, contract) = proposal(&mut t, 3);
        t.game.accept_contract(contract.id, ids[0]).unwrap();

        let mut supplier = t.game.company(ids[0]).unwrap();
        t.game.run_contracts(&mut supplier, 2).unwrap();
        t.game.run_contracts(&mut supplier, 3).unwrap();
        assert_eq!(supplier.reputation, 80);
        assert_eq!(t.game.contract(contract.id).unwrap().turns_passed, 2);
        t.game.run_contracts(&mut supplier, 4).unwrap();
        assert_eq!(supplier.reputation, 75);
        assert_eq!(supplier.balance, 5300);
    }

    #[test]
    fn unaccepted_proposals_expire_next_turn() {
        let mut t = TestGame::new();
        let (ids, contract) = proposal(&mut t, 2);
        let mut supplier = t.game.company(ids[0]).unwrap();
        t.game.run_contracts(&mut supplier, 1).unwrap();
        assert!(t.game.contract(contract.id).is_ok());
        t.game.run_contracts(&mut supplier, 2).unwrap();
        assert!(t.game.contract(contract.id).is_err());
    }

    #[test]
    fn dissolving_refunds_the_customer() {
        let mut t = TestGame::new();
        let (ids, contract) = proposal(&mut t, 2);
        t.game.accept_contract(contract.id, ids[0]).unwrap();
        t.game.delete_company(ids[0]).unwrap();
        assert_eq!(t.game.company(ids[1]).unwrap().balance, 5000);
        assert!(t.game.company_contracts(ids[1]).unwrap().is_empty());
        assert_eq!(t.game.escrow().verify_resolved(DealRef::Contract(contract.id)), Ok(()));
    }
}
