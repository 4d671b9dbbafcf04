//! Sessions: creation, map generation, cell selection and teardown.

use std::collections::BTreeMap;
use std::sync::Arc;

use emporium_types::{
    Company, Contract, Document, EventName, Exchange, MapSize, Session, SessionId, SessionStage,
    Statistic, StepSchedule, User,
};
use rand::Rng;
use rand::distr::Alphanumeric;
use rand::seq::SliceRandom;
use serde_json::json;
use tracing::info;

use crate::catalog::{Anchor, Location};
use crate::error::GameError;
use crate::game::Game;

fn resolve_location(loc: Location, size: MapSize, rng: &mut impl Rng) -> (u32, u32) {
    let rows = i64::from(size.rows.max(1));
    let cols = i64::from(size.cols.max(1));
    let last_row = rows.saturating_sub(1);
    let last_col = cols.saturating_sub(1);
    let (row, col) = match loc.anchor {
        Anchor::Center => (rows / 2, cols / 2),
        Anchor::Random => (rng.random_range(0..rows), rng.random_range(0..cols)),
        Anchor::TopLeft => (0, 0),
        Anchor::TopRight => (0, last_col),
        Anchor::BottomLeft => (last_row, 0),
        Anchor::BottomRight => (last_row, last_col),
    };
    let row = row.saturating_add(loc.dy).clamp(0, last_row);
    let col = col.saturating_add(loc.dx).clamp(0, last_col);
    (
        u32::try_from(row).unwrap_or(0),
        u32::try_from(col).unwrap_or(0),
    )
}

/// `"x.y"` for a map position.
pub fn position_key(x: u32, y: u32) -> String {
    format!("{x}.{y}")
}

impl Game {
    /// Create a session in `WaitWebConnect`. A code is generated unless
    /// `requested` is given.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Validation`] for a malformed or taken code.
    pub fn create_session(&mut self, requested: Option<&str>) -> Result<Session, GameError> {
        let session_id = match requested {
            Some(code) => {
                if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(GameError::Validation(String::from(
                        "session code must be non-empty and alphanumeric",
                    )));
                }
                let id = SessionId::from(code);
                if self.store.get::<Session>(&id)?.is_some() {
                    return Err(GameError::Validation(format!("session {id} already exists")));
                }
                id
            }
            None => loop {
                let code: String = (&mut self.rng)
                    .sample_iter(Alphanumeric)
                    .take(SessionId::LENGTH)
                    .map(char::from)
                    .collect();
                let id = SessionId::from(code);
                if self.store.get::<Session>(&id)?.is_none() {
                    break id;
                }
            },
        };

        let settings = &self.catalog.settings;
        let session = Session {
            session_id,
            stage: SessionStage::WaitWebConnect,
            step: 0,
            max_steps: settings.max_steps,
            map_size: MapSize::square(settings.map_side),
            cells: Vec::new(),
            cell_counts: BTreeMap::new(),
            change_turn_schedule_id: None,
            event_type: None,
            event_start: None,
            event_end: None,
            result: None,
        };
        self.save(&session)?;
        info!(session_id = %session.session_id, "session created");
        self.emit(EventName::CreateSession, json!({ "session": session }));
        Ok(session)
    }

    /// All sessions, optionally only those in `stage`.
    pub fn sessions(&self, stage: Option<SessionStage>) -> Result<Vec<Session>, GameError> {
        let filter = stage.map_or(serde_json::Value::Null, |s| json!({ "stage": s }));
        Ok(self.store.find_typed(&filter)?)
    }

    /// Companies of a session, ascending by id.
    pub fn session_companies(&self, id: &SessionId) -> Result<Vec<Company>, GameError> {
        let mut companies: Vec<Company> = self.store.find_typed(&json!({ "session_id": id }))?;
        companies.sort_by_key(|c| c.id);
        Ok(companies)
    }

    /// Users of a session.
    pub fn session_users(&self, id: &SessionId) -> Result<Vec<User>, GameError> {
        Ok(self.store.find_typed(&json!({ "session_id": id }))?)
    }

    /// Fill `session.cells`: fixed placements first, then a shuffled even
    /// spread of pickable types over the remaining cells.
    pub(crate) fn generate_cells(&mut self, session: &mut Session) -> Result<(), GameError> {
        if !session.cells.is_empty() {
            return Err(GameError::State(String::from("map already generated")));
        }
        let catalog = Arc::clone(&self.catalog);
        let size = session.map_size;
        let mut cells: Vec<Option<String>> = vec![None; size.cell_count()];

        for (cell_id, cell) in &catalog.cells {
            for loc in cell.placements() {
                let (x, y) = resolve_location(loc, size, &mut self.rng);
                if let Some(slot) = size.index(x, y).and_then(|i| cells.get_mut(i)) {
                    *slot = Some(cell_id.clone());
                }
            }
        }

        let pickable = catalog.pickable_cells();
        let empty: Vec<usize> = cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_none())
            .map(|(i, _)| i)
            .collect();
        if !pickable.is_empty() {
            let mut fill: Vec<&str> = pickable.iter().copied().cycle().take(empty.len()).collect();
            fill.shuffle(&mut self.rng);
            for (idx, cell_id) in empty.into_iter().zip(fill) {
                if let Some(slot) = cells.get_mut(idx) {
                    *slot = Some(cell_id.to_owned());
                }
            }
        }

        session.cells = cells.into_iter().map(Option::unwrap_or_default).collect();
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for cell in &session.cells {
            let n = counts.entry(cell.clone()).or_default();
            *n = n.saturating_add(1);
        }
        session.cell_counts = counts;
        info!(session_id = %session.session_id, counts = ?session.cell_counts, "map generated");
        Ok(())
    }

    /// Company occupying `(x, y)`.
    pub fn company_on_cell(
        &self,
        session_id: &SessionId,
        x: u32,
        y: u32,
    ) -> Result<Option<Company>, GameError> {
        Ok(self.store.find_one_typed(&json!({
            "session_id": session_id,
            "cell_position": position_key(x, y),
        }))?)
    }

    /// Whether `(x, y)` is a pickable, unoccupied cell. Stage is not
    /// checked.
    pub(crate) fn is_free_cell(&self, session: &Session, x: u32, y: u32) -> Result<bool, GameError> {
        let pickable = session
            .cell_at(x, y)
            .and_then(|id| self.catalog.cell(id))
            .is_some_and(|c| c.pickable);
        if !pickable {
            return Ok(false);
        }
        Ok(self.company_on_cell(&session.session_id, x, y)?.is_none())
    }

    /// Whether a company may pick `(x, y)` now.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::State`] outside `CellSelect`.
    pub fn can_select_cell(&self, session: &Session, x: u32, y: u32) -> Result<bool, GameError> {
        if session.stage != SessionStage::CellSelect {
            return Err(GameError::State(String::from(
                "cells can only be selected during CellSelect",
            )));
        }
        self.is_free_cell(session, x, y)
    }

    /// Every pickable, unoccupied position of a session.
    pub fn free_cells(&self, id: &SessionId) -> Result<Vec<(u32, u32)>, GameError> {
        let session = self.session(id)?;
        self.free_positions(&session)
    }

    pub(crate) fn free_positions(&self, session: &Session) -> Result<Vec<(u32, u32)>, GameError> {
        let occupied: Vec<String> = self
            .session_companies(&session.session_id)?
            .into_iter()
            .filter_map(|c| c.cell_position)
            .collect();
        let mut free = Vec::new();
        for x in 0..session.map_size.rows {
            for y in 0..session.map_size.cols {
                let pickable = session
                    .cell_at(x, y)
                    .and_then(|id| self.catalog.cell(id))
                    .is_some_and(|c| c.pickable);
                if pickable && !occupied.contains(&position_key(x, y)) {
                    free.push((x, y));
                }
            }
        }
        Ok(free)
    }

    /// A random free position.
    pub(crate) fn random_free_position(&mut self, session: &Session) -> Result<Option<(u32, u32)>, GameError> {
        let free = self.free_positions(session)?;
        if free.is_empty() {
            return Ok(None);
        }
        let idx = self.rng.random_range(0..free.len());
        Ok(free.get(idx).copied())
    }

    /// Delete a session with its companies, users, schedules and
    /// statistics. Escrow held by its deals is refunded first.
    pub fn delete_session(&mut self, id: &SessionId) -> Result<(), GameError> {
        let session = self.session(id)?;
        if let Some(task) = session.change_turn_schedule_id {
            self.cancel_task(task)?;
        }
        for company in self.session_companies(id)? {
            self.delete_company(company.id)?;
        }
        let filter = json!({ "session_id": id });
        self.store.delete(User::TABLE, &filter)?;
        self.store.delete(Exchange::TABLE, &filter)?;
        self.store.delete(Contract::TABLE, &filter)?;
        self.store.delete(StepSchedule::TABLE, &filter)?;
        self.store.delete(Statistic::TABLE, &filter)?;
        self.store.remove(&session)?;
        info!(session_id = %id, "session deleted");
        self.emit(EventName::SessionDeleted, json!({ "session_id": id }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::indexing_slicing)]

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::testing::TestGame;

    #[test]
    fn generated_codes_are_alphanumeric_and_unique() {
        let mut t = TestGame::new();
        let a = t.game.create_session(None).unwrap();
        let b = t.game.create_session(None).unwrap();
        assert_eq!(a.session_id.as_str().len(), SessionId::LENGTH);
        assert!(a.session_id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a.session_id, b.session_id);
        assert_eq!(a.stage, SessionStage::WaitWebConnect);
        assert_eq!(a.max_steps, 15);
    }

    #[test]
    fn requested_code_must_be_free() {
        let mut t = TestGame::new();
        t.game.create_session(Some("ROOM1")).unwrap();
        let err = t.game.create_session(Some("ROOM1")).unwrap_err();
        assert_eq!(err.kind(), "validation");
        let err = t.game.create_session(Some("bad code")).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn map_places_fixed_cells_and_fills_the_rest() {
        let mut t = TestGame::new();
        let mut session = t.game.create_session(None).unwrap();
        t.game.generate_cells(&mut session).unwrap();

        assert_eq!(session.cells.len(), 49);
        assert_eq!(session.cell_at(3, 3), Some("bank"));
        assert_eq!(session.cell_counts.get("bank"), Some(&1));
        let forest = session.cell_counts.get("forest").copied().unwrap_or(0);
        let mountain = session.cell_counts.get("mountain").copied().unwrap_or(0);
        assert_eq!(forest + mountain, 48);
        assert_eq!(forest, 24);

        let err = t.game.generate_cells(&mut session).unwrap_err();
        assert_eq!(err.kind(), "state");
    }

    #[test]
    fn locations_clamp_to_the_map() {
        let mut rng = StdRng::seed_from_u64(1);
        let size = MapSize::square(5);
        let loc = Location::parse("bottom_right_3_3").unwrap();
        assert_eq!(resolve_location(loc, size, &mut rng), (4, 4));
        let loc = Location::parse("center_-1_1").unwrap();
        assert_eq!(resolve_location(loc, size, &mut rng), (3, 1));
        let loc = Location::parse("top_left_-2_0").unwrap();
        assert_eq!(resolve_location(loc, size, &mut rng), (0, 0));
    }

    #[test]
    fn free_cells_exclude_bank_and_occupied() {
        let mut t = TestGame::new();
        let (session, companies) = t.playing(1);
        let s = t.game.session(&session).unwrap();
        let free = t.game.free_cells(&session).unwrap();
        assert_eq!(free.len(), 47);
        assert!(!free.contains(&(3, 3)));
        let pos = t.game.company(companies[0]).unwrap().position().unwrap();
        assert!(!free.contains(&pos));
        let err = t.game.can_select_cell(&s, 0, 0).unwrap_err();
        assert_eq!(err.kind(), "state");
    }

    #[test]
    fn delete_session_removes_everything_and_broadcasts() {
        let mut t = TestGame::new();
        let (session, _) = t.playing(2);
        t.game.drain_events();

        t.game.delete_session(&session).unwrap();
        assert!(t.game.session(&session).is_err());
        assert!(t.game.session_companies(&session).unwrap().is_empty());
        assert!(t.game.session_users(&session).unwrap().is_empty());
        assert!(t.game.time_tasks().unwrap().is_empty());
        let events = t.game.drain_events();
        assert_eq!(
            events.last().map(|e| e.name),
            Some(EventName::SessionDeleted)
        );
    }
}
