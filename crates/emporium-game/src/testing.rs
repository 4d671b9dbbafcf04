//! Test fixtures shared by the unit tests of this crate.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use emporium_store::DocumentStore;
use emporium_types::{CompanyId, SessionId, SessionStage, UserId};

use crate::catalog::Catalog;
use crate::clock::ManualClock;
use crate::game::{Game, GameSettings};

/// A game over an in-memory store, the sample catalog, a manual clock and
/// a fixed seed. Random events are off unless a test turns them on.
pub(crate) struct TestGame {
    pub game: Game,
    pub clock: Arc<ManualClock>,
}

impl TestGame {
    pub fn new() -> Self {
        Self::with_settings(GameSettings {
            event_chance_percent: 0,
            seed: Some(7),
        })
    }

    pub fn with_settings(settings: GameSettings) -> Self {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single().unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let game = Game::new(
            Arc::new(DocumentStore::in_memory()),
            Arc::new(Catalog::sample().unwrap()),
            Arc::clone(&clock) as Arc<dyn crate::clock::Clock>,
            settings,
        );
        Self { game, clock }
    }

    /// A fresh session in `WaitWebConnect`.
    pub fn session(&mut self) -> SessionId {
        self.game.create_session(None).unwrap().session_id
    }

    /// A session in `FreeUserConnect`.
    pub fn lobby(&mut self) -> SessionId {
        let id = self.session();
        self.game
            .update_session_stage(&id, SessionStage::FreeUserConnect)
            .unwrap();
        id
    }

    /// A company owned by a new user `uid`.
    pub fn company(&mut self, session: &SessionId, uid: i64, name: &str) -> CompanyId {
        self.game
            .create_user(session, UserId(uid), &format!("user{uid}"))
            .unwrap();
        self.game
            .create_company(session, name, Some(UserId(uid)))
            .unwrap()
            .id
    }

    /// A session on step 1 with `n` companies, each on a forest cell.
    pub fn playing(&mut self, n: usize) -> (SessionId, Vec<CompanyId>) {
        let session = self.lobby();
        let mut companies = Vec::new();
        for i in 0..n {
            let uid = i64::try_from(i).unwrap() + 1;
            companies.push(self.company(&session, uid, &format!("Company {uid}")));
        }
        self.game
            .update_session_stage(&session, SessionStage::CellSelect)
            .unwrap();
        let map = self.game.session(&session).unwrap();
        let forests: Vec<(u32, u32)> = self
            .game
            .free_cells(&session)
            .unwrap()
            .into_iter()
            .filter(|&(x, y)| map.cell_at(x, y) == Some("forest"))
            .collect();
        for (company, &(x, y)) in companies.iter().zip(&forests) {
            self.game.set_position(*company, x, y).unwrap();
        }
        self.game
            .update_session_stage(&session, SessionStage::Game)
            .unwrap();
        (session, companies)
    }

    /// Run the timer twice: the current turn ends and the next one starts.
    pub fn next_turn(&mut self, session: &SessionId) {
        self.game.advance_stage(session).unwrap();
        self.game.advance_stage(session).unwrap();
    }

    /// Overwrite a warehouse entry without capacity checks.
    pub fn stock(&mut self, company: CompanyId, resource: &str, amount: u32) {
        let mut c = self.game.company(company).unwrap();
        c.warehouses.insert(resource.to_owned(), amount);
        self.game.save(&c).unwrap();
    }

    pub fn set_balance(&mut self, company: CompanyId, balance: i64) {
        let mut c = self.game.company(company).unwrap();
        c.balance = balance;
        self.game.save(&c).unwrap();
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.clock.advance(Duration::minutes(minutes));
    }
}
