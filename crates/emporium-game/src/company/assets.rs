//! Balance, warehouse, reputation and prison mutations.
//!
//! These helpers change a loaded [`Company`] in place and queue the
//! matching broadcast; the caller saves the record. Checks run before the
//! mutation, so an `Err` leaves the company untouched.

use emporium_types::{Company, CompanyId, EventName, SessionStage};
use serde_json::json;
use tracing::{info, warn};

use crate::error::GameError;
use crate::game::{Game, kwargs};
use crate::registry::COMPANY_LEAVE_PRISON;

impl Game {
    // -----------------------------------------------------------------------
    // Money
    // -----------------------------------------------------------------------

    pub(crate) fn credit_money(&mut self, company: &mut Company, amount: i64) -> Result<(), GameError> {
        if amount == 0 {
            return Ok(());
        }
        let old = company.balance;
        company.balance = old
            .checked_add(amount)
            .ok_or_else(|| GameError::overflow("balance"))?;
        self.emit_balance(company, old);
        Ok(())
    }

    pub(crate) fn debit_money(&mut self, company: &mut Company, amount: i64) -> Result<(), GameError> {
        if amount < 0 {
            return Err(GameError::Validation(String::from("amount must be positive")));
        }
        if company.balance < amount {
            return Err(GameError::Validation(format!(
                "insufficient funds: balance {}, required {amount}",
                company.balance
            )));
        }
        if amount == 0 {
            return Ok(());
        }
        let old = company.balance;
        company.balance = old.saturating_sub(amount);
        self.emit_balance(company, old);
        Ok(())
    }

    fn emit_balance(&mut self, company: &Company, old: i64) {
        self.emit(
            EventName::CompanyBalanceChanged,
            json!({
                "company_id": company.id,
                "old_balance": old,
                "new_balance": company.balance,
            }),
        );
    }

    // -----------------------------------------------------------------------
    // Warehouse
    // -----------------------------------------------------------------------

    /// Capacity of the company's warehouse at its current level.
    pub fn warehouse_capacity_of(&self, company: &Company) -> u32 {
        self.catalog.warehouse_capacity(
            company.improvement_level(emporium_types::ImprovementKind::Warehouse),
        )
    }

    pub(crate) fn free_space(&self, company: &Company) -> u32 {
        self.warehouse_capacity_of(company)
            .saturating_sub(company.warehouse_load())
    }

    fn require_resource(&self, resource: &str) -> Result<(), GameError> {
        if self.catalog.resource(resource).is_none() {
            return Err(GameError::Validation(format!("unknown resource {resource}")));
        }
        Ok(())
    }

    fn put(&mut self, company: &mut Company, resource: &str, amount: u32) {
        let slot = company.warehouses.entry(resource.to_owned()).or_default();
        *slot = slot.saturating_add(amount);
        let total = *slot;
        self.emit(
            EventName::CompanyResourceAdded,
            json!({
                "company_id": company.id,
                "resource": resource,
                "amount": amount,
                "total": total,
            }),
        );
    }

    /// Add units, failing when they do not fit.
    pub(crate) fn add_resource(
        &mut self,
        company: &mut Company,
        resource: &str,
        amount: u32,
    ) -> Result<(), GameError> {
        self.require_resource(resource)?;
        if amount == 0 {
            return Ok(());
        }
        let free = self.free_space(company);
        if amount > free {
            return Err(GameError::Capacity(format!(
                "warehouse of company {} is full: {free} free, {amount} needed",
                company.id
            )));
        }
        self.put(company, resource, amount);
        Ok(())
    }

    /// Add as many units as fit. Returns how many were stored.
    pub(crate) fn add_resource_clamped(&mut self, company: &mut Company, resource: &str, amount: u32) -> u32 {
        let stored = amount.min(self.free_space(company));
        if stored < amount {
            warn!(
                company_id = %company.id,
                resource,
                requested = amount,
                stored,
                "warehouse full, excess discarded"
            );
        }
        if stored > 0 {
            self.put(company, resource, stored);
        }
        stored
    }

    /// Return escrowed units to their owner. Conservation outranks
    /// capacity here: the units always go back.
    pub(crate) fn restore_resource(&mut self, company: &mut Company, resource: &str, amount: u32) {
        if amount > 0 {
            self.put(company, resource, amount);
        }
    }

    /// Remove units.
    ///
    /// # Errors
    ///
    /// [`GameError::State`] when the warehouse holds fewer than `amount`.
    pub(crate) fn remove_resource(
        &mut self,
        company: &mut Company,
        resource: &str,
        amount: u32,
    ) -> Result<(), GameError> {
        let held = company.resource_amount(resource);
        if held < amount {
            return Err(GameError::State(format!(
                "company {} holds {held} {resource}, needs {amount}",
                company.id
            )));
        }
        if amount == 0 {
            return Ok(());
        }
        let left = held.saturating_sub(amount);
        if left == 0 {
            company.warehouses.remove(resource);
        } else {
            company.warehouses.insert(resource.to_owned(), left);
        }
        self.emit(
            EventName::CompanyResourceRemoved,
            json!({
                "company_id": company.id,
                "resource": resource,
                "amount": amount,
                "total": left,
            }),
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reputation
    // -----------------------------------------------------------------------

    fn emit_reputation(&mut self, company: &Company, old: u32) {
        if old != company.reputation {
            self.emit(
                EventName::CompanyReputationChanged,
                json!({
                    "company_id": company.id,
                    "old_reputation": old,
                    "new_reputation": company.reputation,
                }),
            );
        }
    }

    pub(crate) fn add_reputation(&mut self, company: &mut Company, amount: u32) {
        let old = company.reputation;
        company.reputation = old.saturating_add(amount);
        self.emit_reputation(company, old);
    }

    /// Lower reputation, floored at zero. Crossing the prison threshold
    /// from above jails the company.
    pub(crate) fn remove_reputation(&mut self, company: &mut Company, amount: u32) -> Result<(), GameError> {
        let old = company.reputation;
        company.reputation = old.saturating_sub(amount);
        self.emit_reputation(company, old);
        let threshold = self.catalog.reputation.prison.on_reputation;
        if old > threshold && company.reputation <= threshold && !company.in_prison {
            self.to_prison(company)?;
        }
        Ok(())
    }

    /// Reputation to zero and straight to prison.
    pub(crate) fn ruin(&mut self, company: &mut Company) -> Result<(), GameError> {
        let old = company.reputation;
        company.reputation = 0;
        self.emit_reputation(company, old);
        self.to_prison(company)
    }

    // -----------------------------------------------------------------------
    // Prison
    // -----------------------------------------------------------------------

    /// Jail a company for `reputation.prison.stages` turns and register its
    /// release on the step scheduler.
    pub(crate) fn to_prison(&mut self, company: &mut Company) -> Result<(), GameError> {
        if company.in_prison {
            return Ok(());
        }
        let session = self.session(&company.session_id)?;
        let stages = self.catalog.reputation.prison.stages.max(1);
        let end = session.step.saturating_add(stages);
        company.in_prison = true;
        company.prison_end_step = Some(end);
        self.add_step_call(
            &company.session_id,
            end,
            COMPANY_LEAVE_PRISON,
            kwargs(&[("company_id", json!(company.id))]),
        )?;
        info!(company_id = %company.id, step = session.step, end_step = end, "company sent to prison");
        self.emit(
            EventName::CompanyToPrison,
            json!({ "company_id": company.id, "end_step": end }),
        );
        Ok(())
    }

    /// Release a jailed company. With `prison.new_cell` it is moved to a
    /// random free cell.
    pub fn leave_prison(&mut self, id: CompanyId) -> Result<Company, GameError> {
        let mut company = self.company(id)?;
        if !company.in_prison {
            return Err(GameError::State(format!("company {id} is not in prison")));
        }
        let session = self.session(&company.session_id)?;
        company.in_prison = false;
        company.prison_end_step = None;
        if self.catalog.reputation.prison.new_cell && session.stage != SessionStage::End {
            if let Some((x, y)) = self.random_free_position(&session)? {
                company.cell_position = Some(crate::session::position_key(x, y));
            }
        }
        self.save(&company)?;
        info!(company_id = %id, step = session.step, "company left prison");
        self.emit(
            EventName::CompanyLeftPrison,
            json!({ "company_id": id, "position": company.cell_position }),
        );
        Ok(company)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::indexing_slicing)]

    use super::*;
    use crate::testing::TestGame;

    #[test]
    fn strict_add_respects_capacity() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(1);
        t.stock(ids[0], "wood", 95);
        let mut c = t.game.company(ids[0]).unwrap();

        let err = t.game.add_resource(&mut c, "stone", 10).unwrap_err();
        assert_eq!(err.kind(), "capacity");
        assert_eq!(c.resource_amount("stone"), 0);

        t.game.add_resource(&mut c, "stone", 5).unwrap();
        assert_eq!(c.warehouse_load(), 100);
        assert_eq!(t.game.add_resource_clamped(&mut c, "stone", 3), 0);

        let err = t.game.add_resource(&mut c, "gold", 1).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn remove_checks_stock_and_drops_empty_entries() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(1);
        t.stock(ids[0], "wood", 4);
        let mut c = t.game.company(ids[0]).unwrap();
        t.game.drain_events();

        let err = t.game.remove_resource(&mut c, "wood", 5).unwrap_err();
        assert_eq!(err.kind(), "state");
        t.game.remove_resource(&mut c, "wood", 4).unwrap();
        assert!(!c.warehouses.contains_key("wood"));
        let events = t.game.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, EventName::CompanyResourceRemoved);
        assert_eq!(events[0].data["total"], 0);
    }

    #[test]
    fn debit_rejects_overdraft() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(1);
        let mut c = t.game.company(ids[0]).unwrap();
        let err = t.game.debit_money(&mut c, 5_001).unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(c.balance, 5_000);
        t.game.debit_money(&mut c, 1_000).unwrap();
        assert_eq!(c.balance, 4_000);
    }

    #[test]
    fn reputation_floor_and_prison_on_crossing() {
        let mut t = TestGame::new();
        let (session, ids) = t.playing(1);
        let mut c = t.game.company(ids[0]).unwrap();

        t.game.remove_reputation(&mut c, 500).unwrap();
        assert_eq!(c.reputation, 0);
        assert!(c.in_prison);
        assert_eq!(c.prison_end_step, Some(3));
        t.game.save(&c).unwrap();
        let calls = t.game.step_calls(&session, 3).unwrap();
        assert_eq!(calls[0].function_path, COMPANY_LEAVE_PRISON);

        let released = t.game.leave_prison(ids[0]).unwrap();
        assert!(!released.in_prison);
        assert_eq!(released.reputation, 0);

        // Already at the floor: no new crossing, no new sentence.
        let mut c = released;
        t.game.remove_reputation(&mut c, 10).unwrap();
        assert!(!c.in_prison);
    }

    #[test]
    fn prisoners_cannot_act() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(1);
        let mut c = t.game.company(ids[0]).unwrap();
        t.game.ruin(&mut c).unwrap();
        t.game.save(&c).unwrap();

        let err = t
            .game
            .upgrade_improvement(ids[0], emporium_types::ImprovementKind::Warehouse)
            .unwrap_err();
        assert_eq!(err.kind(), "state");
        let err = t.game.leave_prison(CompanyId(999)).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
