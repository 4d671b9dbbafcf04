//! The per-turn accrual pipeline.
//!
//! Runs when a session enters `Game` for `step`. Companies are processed
//! one by one in ascending id, each through the same fixed sequence:
//!
//! ```text
//! income rollover -> business type -> deposits -> credits -> taxes
//!     -> cell extraction -> factories -> contracts
//! ```
//!
//! A company jailed for unpaid taxes skips everything after the tax
//! step. Once every company is done the session-wide passes run:
//! exchange expiry, step calls for `step`, valuation and statistics, and
//! finally the random event roll. Event effects are read once, at the
//! start, so an event rolled at the end applies from the next turn.

use emporium_types::{BusinessType, Company, CompanyId, ImprovementKind, SessionId};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, error, info};

use crate::error::GameError;
use crate::events::ActiveEffects;
use crate::game::Game;

impl Game {
    /// Run turn `step` of a session.
    pub(crate) fn run_turn(&mut self, id: &SessionId, step: u32) -> Result<(), GameError> {
        let session = self.session(id)?;
        let effects = self.active_effects(&session);
        let companies: Vec<CompanyId> = self
            .session_companies(id)?
            .into_iter()
            .map(|c| c.id)
            .collect();
        info!(session_id = %id, step, companies = companies.len(), event = ?effects.event_id(), "turn started");

        for company in companies {
            if let Err(err) = self.run_company_turn(company, step, &effects) {
                error!(session_id = %id, company_id = %company, step, error = %err, "company turn failed");
            }
        }

        self.expire_exchanges(id, step)?;
        self.run_step_calls(id, step)?;
        for mut company in self.session_companies(id)? {
            company.economic_power = self.economic_power(&company)?;
            self.save(&company)?;
            self.record_statistic(&company, step)?;
        }
        self.expire_event(id, step)?;
        self.roll_event(id)?;
        info!(session_id = %id, step, "turn finished");
        Ok(())
    }

    /// Load, advance and save one company. The record is saved even when a
    /// step fails, so it matches the factories and escrow already written.
    fn run_company_turn(&mut self, id: CompanyId, step: u32, effects: &ActiveEffects) -> Result<(), GameError> {
        let mut company = self.company(id)?;
        let outcome = self.advance_company(&mut company, step, effects);
        self.save(&company)?;
        outcome?;
        debug!(company_id = %id, step, balance = company.balance, "company turn done");
        Ok(())
    }

    fn advance_company(&mut self, company: &mut Company, step: u32, effects: &ActiveEffects) -> Result<(), GameError> {
        company.last_turn_income = company.this_turn_income;
        company.this_turn_income = 0;
        if step != 1 {
            company.business_type = if company.last_turn_income >= self.catalog.capital.bank.tax.big_on {
                BusinessType::Big
            } else {
                BusinessType::Small
            };
        }

        self.accrue_deposits(company)?;
        self.accrue_credits(company)?;
        if self.assess_taxes(company, effects)? {
            return Ok(());
        }
        if !company.in_prison {
            self.extract_from_cell(company, effects)?;
        }
        self.run_factories(company, effects)?;
        self.run_contracts(company, step)
    }

    /// Station output of the company's cell, scaled by the active event.
    fn extract_from_cell(&mut self, company: &mut Company, effects: &ActiveEffects) -> Result<(), GameError> {
        let Some(cell_type) = self.company_cell_type(company)? else {
            return Ok(());
        };
        let Some(resource) = self
            .catalog
            .cell(&cell_type)
            .and_then(|c| c.resource_id.clone())
        else {
            return Ok(());
        };
        let level = company.improvement_level(ImprovementKind::Station);
        let per_turn = self
            .catalog
            .level(ImprovementKind::Station, Some(&cell_type), level)
            .and_then(|l| l.products_per_turn)
            .unwrap_or(0);
        let amount = Decimal::from(per_turn)
            .checked_mul(effects.extraction_factor(Some(&cell_type)))
            .and_then(|v| v.floor().to_u32())
            .unwrap_or(0);
        if amount > 0 {
            self.add_resource_clamped(company, &resource, amount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::indexing_slicing)]

    use emporium_types::{EventName, SessionStage};
    use serde_json::json;

    use super::*;
    use crate::testing::TestGame;

    #[test]
    fn first_turn_extracts_from_the_cell() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(1);
        let company = t.game.company(ids[0]).unwrap();
        assert_eq!(company.resource_amount("wood"), 5);
        assert_eq!(company.economic_power, 5050);
    }

    #[test]
    fn extraction_is_broadcast_with_the_amount() {
        let mut t = TestGame::new();
        let (session, ids) = t.playing(1);
        t.game.drain_events();
        t.next_turn(&session);
        let added: Vec<_> = t
            .game
            .drain_events()
            .into_iter()
            .filter(|e| e.name == EventName::CompanyResourceAdded)
            .collect();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].data["company_id"], serde_json::json!(ids[0]));
        assert_eq!(added[0].data["amount"], 5);
    }

    #[test]
    fn income_rolls_over_and_sets_the_bracket() {
        let mut t = TestGame::new();
        let (session, ids) = t.playing(1);
        let mut c = t.game.company(ids[0]).unwrap();
        c.this_turn_income = 6000;
        t.game.save(&c).unwrap();
        t.next_turn(&session);

        let c = t.game.company(ids[0]).unwrap();
        assert_eq!(c.last_turn_income, 6000);
        assert_eq!(c.this_turn_income, 0);
        assert_eq!(c.business_type, BusinessType::Big);
        assert_eq!(c.tax_debt, 1200);
    }

    #[test]
    fn jailed_companies_do_not_extract() {
        let mut t = TestGame::new();
        let (session, ids) = t.playing(1);
        let mut c = t.game.company(ids[0]).unwrap();
        c.in_prison = true;
        c.prison_end_step = Some(9);
        t.game.save(&c).unwrap();
        t.next_turn(&session);
        assert_eq!(t.game.company(ids[0]).unwrap().resource_amount("wood"), 5);
    }

    #[test]
    fn full_warehouse_discards_the_excess() {
        let mut t = TestGame::new();
        let (session, ids) = t.playing(1);
        t.stock(ids[0], "stone", 93);
        t.next_turn(&session);
        let c = t.game.company(ids[0]).unwrap();
        assert_eq!(c.warehouse_load(), 100);
        assert_eq!(c.resource_amount("wood"), 7);
    }

    #[test]
    fn scheduled_release_runs_after_the_company_pass() {
        let mut t = TestGame::new();
        let (session, ids) = t.playing(1);
        let mut c = t.game.company(ids[0]).unwrap();
        t.game.to_prison(&mut c).unwrap();
        t.game.save(&c).unwrap();
        assert_eq!(c.prison_end_step, Some(3));

        t.next_turn(&session);
        assert!(t.game.company(ids[0]).unwrap().in_prison);
        t.next_turn(&session);
        let c = t.game.company(ids[0]).unwrap();
        assert!(!c.in_prison);
        // Still jailed during the step-3 company pass.
        assert_eq!(c.resource_amount("wood"), 5);
        assert_eq!(t.game.session(&session).unwrap().stage, SessionStage::Game);
    }

    #[test]
    fn failed_contract_step_keeps_consumed_materials() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(1);
        let fid = t.game.factories_of(ids[0]).unwrap()[0].id;
        t.stock(ids[0], "wood", 4);
        t.game.set_produce(fid, true).unwrap();
        // A contract record that no longer decodes makes the contract step fail.
        t.game
            .store
            .insert("contracts", json!({ "id": 99, "supplier_company_id": ids[0] }))
            .unwrap();

        let err = t
            .game
            .run_company_turn(ids[0], 2, &ActiveEffects::default())
            .unwrap_err();
        assert_eq!(err.kind(), "store");

        let c = t.game.company(ids[0]).unwrap();
        assert_eq!(t.game.factory(fid).unwrap().produced, 1);
        assert_eq!(c.resource_amount("wood"), 7);
        assert_eq!(c.resource_amount("planks"), 1);
    }
}
