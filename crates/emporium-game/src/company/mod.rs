//! Companies: creation, map placement, improvements and removal.
//!
//! # Modules
//!
//! - `assets` - balance, warehouse, reputation and prison helpers
//! - `bank` - credits, deposits and taxes

mod assets;
mod bank;

use std::collections::BTreeMap;

use emporium_types::{
    Company, CompanyId, Document, EventName, Exchange, Factory, ImprovementKind, Session,
    SessionId, SessionStage, User, UserId,
};
use rand::Rng;
use serde_json::json;
use tracing::info;

use crate::error::GameError;
use crate::game::Game;
use crate::session::position_key;

const SECRET_CODES: core::ops::RangeInclusive<u32> = 100_000..=999_999;

impl Game {
    /// Companies of a session, or of every session.
    pub fn companies(&self, session_id: Option<&SessionId>) -> Result<Vec<Company>, GameError> {
        match session_id {
            Some(id) => self.session_companies(id),
            None => {
                let mut all: Vec<Company> = self.store.find_typed(&serde_json::Value::Null)?;
                all.sort_by_key(|c| c.id);
                Ok(all)
            }
        }
    }

    /// Create a company in the lobby. When `owner` is given, that user
    /// joins it.
    ///
    /// # Errors
    ///
    /// - [`GameError::State`] outside `FreeUserConnect` or when the owner
    ///   already belongs to a company.
    /// - [`GameError::Validation`] for an empty or taken name.
    /// - [`GameError::Capacity`] when the session is full.
    pub fn create_company(
        &mut self,
        session_id: &SessionId,
        name: &str,
        owner: Option<UserId>,
    ) -> Result<Company, GameError> {
        let session = self.session(session_id)?;
        if session.stage != SessionStage::FreeUserConnect {
            return Err(GameError::State(String::from(
                "companies can only be created during FreeUserConnect",
            )));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::Validation(String::from("company name is empty")));
        }
        let existing = self.session_companies(session_id)?;
        let max = usize::try_from(self.catalog.settings.max_companies).unwrap_or(usize::MAX);
        if existing.len() >= max {
            return Err(GameError::Capacity(format!(
                "session already has {} companies",
                existing.len()
            )));
        }
        if existing.iter().any(|c| c.name == name) {
            return Err(GameError::Validation(format!("company name {name} is taken")));
        }
        let mut user = match owner {
            Some(uid) => {
                let user = self.user(uid, session_id)?;
                if let Some(current) = user.company_id {
                    return Err(GameError::State(format!(
                        "user {uid} already belongs to company {current}"
                    )));
                }
                Some(user)
            }
            None => None,
        };

        let taken: Vec<u32> = self
            .store
            .find_typed::<Company>(&serde_json::Value::Null)?
            .into_iter()
            .map(|c| c.secret_code)
            .collect();
        let secret_code = loop {
            let code = self.rng.random_range(SECRET_CODES);
            if !taken.contains(&code) {
                break code;
            }
        };

        let start = &self.catalog.settings.start_improvements_level;
        let improvements: BTreeMap<String, u32> = [
            (ImprovementKind::Warehouse, start.warehouse),
            (ImprovementKind::Contracts, start.contracts),
            (ImprovementKind::Station, start.station),
            (ImprovementKind::Factory, start.factory),
        ]
        .into_iter()
        .map(|(kind, level)| (kind.as_str().to_owned(), level))
        .collect();

        let company = Company {
            id: CompanyId(self.store.next_id(Company::TABLE)?),
            name: name.to_owned(),
            session_id: session_id.clone(),
            owner: owner.unwrap_or_default(),
            users: owner.into_iter().collect(),
            balance: self.catalog.capital.start,
            reputation: self.catalog.reputation.start,
            economic_power: 0,
            cell_position: None,
            warehouses: BTreeMap::new(),
            improvements,
            credits: Vec::new(),
            deposits: Vec::new(),
            tax_debt: 0,
            overdue_steps: 0,
            last_turn_income: 0,
            this_turn_income: 0,
            business_type: emporium_types::BusinessType::Small,
            in_prison: false,
            prison_end_step: None,
            secret_code,
        };
        self.save(&company)?;
        info!(company_id = %company.id, session_id = %session_id, name, "company created");
        self.emit(EventName::CreateCompany, json!({ "company": company }));

        if let Some(user) = user.as_mut() {
            user.company_id = Some(company.id);
            self.save_user(user)?;
            self.emit(
                EventName::UserAddedToCompany,
                json!({ "user_id": user.id, "company_id": company.id }),
            );
        }
        Ok(company)
    }

    /// Take a map cell during `CellSelect`.
    ///
    /// # Errors
    ///
    /// - [`GameError::State`] outside `CellSelect` or when the company
    ///   already has a cell.
    /// - [`GameError::Validation`] when the cell is not pickable or taken.
    pub fn set_position(&mut self, id: CompanyId, x: u32, y: u32) -> Result<Company, GameError> {
        let mut company = self.company(id)?;
        let session = self.session(&company.session_id)?;
        if company.cell_position.is_some() {
            return Err(GameError::State(format!("company {id} already has a cell")));
        }
        if !self.can_select_cell(&session, x, y)? {
            return Err(GameError::Validation(format!("cell {x}.{y} cannot be selected")));
        }
        self.place_company(&mut company, &session, x, y)?;
        Ok(company)
    }

    /// Put a company on `(x, y)` and build its starting factories.
    pub(crate) fn place_company(
        &mut self,
        company: &mut Company,
        session: &Session,
        x: u32,
        y: u32,
    ) -> Result<(), GameError> {
        let cell_type = session
            .cell_at(x, y)
            .ok_or_else(|| GameError::Validation(format!("cell {x}.{y} is off the map")))?
            .to_owned();
        company.cell_position = Some(position_key(x, y));
        self.save(company)?;

        if self.factories_of(company.id)?.is_empty() {
            let level = company.improvement_level(ImprovementKind::Factory);
            let count = self
                .catalog
                .level(ImprovementKind::Factory, Some(&cell_type), level)
                .and_then(|l| l.factories)
                .unwrap_or(0);
            let tooling = self.catalog.settings.start_complectation.get(&cell_type).cloned();
            for _ in 0..count {
                self.build_factory(company.id, tooling.clone())?;
            }
        }

        info!(company_id = %company.id, x, y, cell_type = %cell_type, "company placed");
        self.emit(
            EventName::CompanySetPosition,
            json!({
                "company_id": company.id,
                "position": company.cell_position,
                "cell_type": cell_type,
            }),
        );
        Ok(())
    }

    /// Cell type id under a company.
    pub fn company_cell_type(&self, company: &Company) -> Result<Option<String>, GameError> {
        let Some((x, y)) = company.position() else {
            return Ok(None);
        };
        let session = self.session(&company.session_id)?;
        Ok(session.cell_at(x, y).map(str::to_owned))
    }

    /// Buy the next level of an improvement.
    ///
    /// # Errors
    ///
    /// - [`GameError::State`] when the company cannot act, or has no cell
    ///   for a station or factory upgrade.
    /// - [`GameError::Validation`] at the top level or without funds.
    pub fn upgrade_improvement(&mut self, id: CompanyId, kind: ImprovementKind) -> Result<Company, GameError> {
        let (mut company, _) = self.acting_company(id)?;
        let cell_type = self.company_cell_type(&company)?;
        if matches!(kind, ImprovementKind::Station | ImprovementKind::Factory) && cell_type.is_none() {
            return Err(GameError::State(format!("company {id} has no cell")));
        }
        let current = company.improvement_level(kind);
        let next = current.saturating_add(1);
        let Some(level) = self.catalog.level(kind, cell_type.as_deref(), next).cloned() else {
            return Err(GameError::Validation(format!(
                "{} is already at its top level {current}",
                kind.as_str()
            )));
        };
        let factories_before = self
            .catalog
            .level(kind, cell_type.as_deref(), current)
            .and_then(|l| l.factories)
            .unwrap_or(0);

        self.debit_money(&mut company, level.cost)?;
        company.improvements.insert(kind.as_str().to_owned(), next);
        self.save(&company)?;

        if kind == ImprovementKind::Factory {
            let extra = level.factories.unwrap_or(0).saturating_sub(factories_before);
            for _ in 0..extra {
                self.build_factory(id, None)?;
            }
        }
        info!(company_id = %id, improvement = kind.as_str(), level = next, "improvement upgraded");
        self.emit(
            EventName::CompanyImprovementUpgraded,
            json!({
                "company_id": id,
                "improvement": kind,
                "level": next,
                "cost": level.cost,
            }),
        );
        Ok(company)
    }

    /// `balance + sum(amount * base_price)` over the warehouse.
    pub fn economic_power(&self, company: &Company) -> Result<i64, GameError> {
        company
            .warehouses
            .iter()
            .try_fold(company.balance, |acc, (resource, amount)| {
                self.catalog
                    .base_price(resource)
                    .checked_mul(i64::from(*amount))
                    .and_then(|v| acc.checked_add(v))
            })
            .ok_or_else(|| GameError::overflow("economic power"))
    }

    /// Delete a company. Escrow held in its deals is refunded, its offers
    /// and contracts and factories are removed, and its users are detached.
    pub fn delete_company(&mut self, id: CompanyId) -> Result<(), GameError> {
        let company = self.company(id)?;

        let offers: Vec<Exchange> = self.store.find_typed(&json!({ "session_id": company.session_id }))?;
        for offer in offers {
            if offer.seller_company_id == id || offer.has_request_from(id) || offer.buyer_company_id == Some(id) {
                self.dissolve_exchange(offer, id)?;
            }
        }
        for contract in self.company_contracts(id)? {
            self.dissolve_contract(contract)?;
        }
        for factory in self.factories_of(id)? {
            self.store.remove(&factory)?;
            self.emit(
                EventName::FactoryDelete,
                json!({ "factory_id": factory.id, "company_id": id }),
            );
        }
        self.store.update(
            User::TABLE,
            &json!({ "company_id": id }),
            &json!({ "company_id": null }),
        )?;
        // Re-read: refunds may have touched this record.
        let company = self.company(id)?;
        self.store.remove(&company)?;
        info!(company_id = %id, session_id = %company.session_id, "company deleted");
        self.emit(
            EventName::CompanyDeleted,
            json!({ "company_id": id, "session_id": company.session_id }),
        );
        Ok(())
    }

    /// Factories of a company by id, for handlers that only have the id.
    pub fn company_factories(&self, id: CompanyId) -> Result<Vec<Factory>, GameError> {
        self.company(id)?;
        self.factories_of(id)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::indexing_slicing)]

    use super::*;
    use crate::testing::TestGame;

    #[test]
    fn company_starts_from_catalog() {
        let mut t = TestGame::new();
        let session = t.lobby();
        let id = t.company(&session, 1, "Acme");
        let c = t.game.company(id).unwrap();
        assert_eq!(c.balance, 5_000);
        assert_eq!(c.reputation, 100);
        assert_eq!(c.owner, UserId(1));
        assert_eq!(c.users, vec![UserId(1)]);
        assert!(SECRET_CODES.contains(&c.secret_code));
        assert_eq!(c.improvement_level(ImprovementKind::Warehouse), 1);
        assert_eq!(t.game.user(UserId(1), &session).unwrap().company_id, Some(id));
    }

    #[test]
    fn names_are_unique_and_stage_is_checked() {
        let mut t = TestGame::new();
        let session = t.lobby();
        t.company(&session, 1, "Acme");
        t.game.create_user(&session, UserId(2), "bob").unwrap();
        let err = t
            .game
            .create_company(&session, "Acme", Some(UserId(2)))
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        let err = t
            .game
            .create_company(&session, "Acme 2", Some(UserId(1)))
            .unwrap_err();
        assert_eq!(err.kind(), "state");

        let fresh = t.session();
        let err = t.game.create_company(&fresh, "Other", None).unwrap_err();
        assert_eq!(err.kind(), "state");
    }

    #[test]
    fn session_capacity_is_enforced() {
        let mut t = TestGame::new();
        let session = t.lobby();
        for i in 0..10 {
            t.game
                .create_company(&session, &format!("C{i}"), None)
                .unwrap();
        }
        let err = t.game.create_company(&session, "C10", None).unwrap_err();
        assert_eq!(err.kind(), "capacity");
    }

    #[test]
    fn positioning_builds_tooled_factories() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(1);
        let factories = t.game.factories_of(ids[0]).unwrap();
        assert_eq!(factories.len(), 1);
        assert_eq!(factories[0].complectation.as_deref(), Some("planks"));
    }

    #[test]
    fn bank_cell_and_occupied_cells_are_refused() {
        let mut t = TestGame::new();
        let session = t.lobby();
        let a = t.company(&session, 1, "A");
        let b = t.company(&session, 2, "B");
        t.game
            .update_session_stage(&session, SessionStage::CellSelect)
            .unwrap();
        let err = t.game.set_position(a, 3, 3).unwrap_err();
        assert_eq!(err.kind(), "validation");

        let (x, y) = t.game.free_cells(&session).unwrap()[0];
        t.game.set_position(a, x, y).unwrap();
        let err = t.game.set_position(b, x, y).unwrap_err();
        assert_eq!(err.kind(), "validation");
        let err = t.game.set_position(a, x, y).unwrap_err();
        assert_eq!(err.kind(), "state");
    }

    #[test]
    fn upgrades_cost_money_and_add_factories() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(1);

        let c = t
            .game
            .upgrade_improvement(ids[0], ImprovementKind::Warehouse)
            .unwrap();
        assert_eq!(c.balance, 4_500);
        assert_eq!(t.game.warehouse_capacity_of(&c), 250);

        let c = t
            .game
            .upgrade_improvement(ids[0], ImprovementKind::Factory)
            .unwrap();
        assert_eq!(c.balance, 3_500);
        assert_eq!(t.game.factories_of(ids[0]).unwrap().len(), 3);

        let err = t
            .game
            .upgrade_improvement(ids[0], ImprovementKind::Factory)
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        t.set_balance(ids[0], 100);
        let err = t
            .game
            .upgrade_improvement(ids[0], ImprovementKind::Warehouse)
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(
            t.game.company(ids[0]).unwrap().improvement_level(ImprovementKind::Warehouse),
            2
        );
    }

    #[test]
    fn economic_power_values_stock_at_base_price() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(1);
        t.stock(ids[0], "wood", 10);
        t.stock(ids[0], "stone", 5);
        let c = t.game.company(ids[0]).unwrap();
        assert_eq!(t.game.economic_power(&c).unwrap(), 5_000 + 100 + 60);
    }

    #[test]
    fn deleting_a_company_detaches_users_and_factories() {
        let mut t = TestGame::new();
        let (session, ids) = t.playing(1);
        t.game.delete_company(ids[0]).unwrap();
        assert!(t.game.company(ids[0]).is_err());
        assert!(t.game.factories_of(ids[0]).unwrap().is_empty());
        assert_eq!(t.game.user(UserId(1), &session).unwrap().company_id, None);
    }
}
