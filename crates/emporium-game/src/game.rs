//! The game context.
//!
//! [`Game`] owns every process-level service the engine needs: the store,
//! the catalog, the clock, a seeded RNG, the escrow audit book and the
//! task registry. Entity services are `impl Game` blocks in their own
//! modules. Mutations queue [`ApiEvent`]s in an outbox that the caller
//! drains after each command, which keeps broadcasts in handler order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use emporium_bank::EscrowBook;
use emporium_store::DocumentStore;
use emporium_types::{ApiEvent, Company, CompanyId, Document, EventName, Session, SessionId, SessionStage};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Map, Value};
use tracing::debug;

use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::error::GameError;
use crate::registry::TaskRegistry;

/// Runtime knobs that are not part of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    /// Chance, in percent, that a new event starts on a turn without one.
    pub event_chance_percent: u32,
    /// Fixed RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            event_chance_percent: 25,
            seed: None,
        }
    }
}

/// The authoritative game engine.
#[derive(Debug)]
pub struct Game {
    pub(crate) store: Arc<DocumentStore>,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) rng: StdRng,
    pub(crate) settings: GameSettings,
    pub(crate) tasks: TaskRegistry,
    pub(crate) escrow: EscrowBook,
    outbox: Vec<ApiEvent>,
}

impl Game {
    /// Build an engine over the given services.
    pub fn new(
        store: Arc<DocumentStore>,
        catalog: Arc<Catalog>,
        clock: Arc<dyn Clock>,
        settings: GameSettings,
    ) -> Self {
        let rng = settings
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self {
            store,
            catalog,
            clock,
            rng,
            settings,
            tasks: TaskRegistry::standard(),
            escrow: EscrowBook::new(),
            outbox: Vec::new(),
        }
    }

    /// The document store.
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// The catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Escrow audit trail.
    pub const fn escrow(&self) -> &EscrowBook {
        &self.escrow
    }

    /// Current wall-clock time.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Registered scheduler symbols.
    pub fn task_symbols(&self) -> Vec<&'static str> {
        self.tasks.symbols()
    }

    /// Take every event queued since the last drain, in emission order.
    pub fn drain_events(&mut self) -> Vec<ApiEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn emit(&mut self, name: EventName, data: Value) {
        debug!(event = name.as_str(), "queued broadcast");
        self.outbox.push(ApiEvent::new(name, data));
    }

    // -----------------------------------------------------------------------
    // Lookups shared by the entity services
    // -----------------------------------------------------------------------

    /// Session by code.
    pub fn session(&self, id: &SessionId) -> Result<Session, GameError> {
        self.store
            .get::<Session>(id)?
            .ok_or_else(|| GameError::not_found("session", id))
    }

    /// Company by id.
    pub fn company(&self, id: CompanyId) -> Result<Company, GameError> {
        self.store
            .get::<Company>(id)?
            .ok_or_else(|| GameError::not_found("company", id))
    }

    pub(crate) fn save<D: Document>(&self, doc: &D) -> Result<(), GameError> {
        self.store.save(doc)?;
        Ok(())
    }

    /// Session of a company, rejecting every mutation once it has ended.
    pub(crate) fn live_session(&self, company: &Company) -> Result<Session, GameError> {
        let session = self.session(&company.session_id)?;
        if session.stage == SessionStage::End {
            return Err(GameError::State(String::from("the game has ended")));
        }
        Ok(session)
    }

    /// Load a company for a play-stage action: the session must be in
    /// `Game` or `ChangeTurn` and the company must not be in prison.
    pub(crate) fn acting_company(&self, id: CompanyId) -> Result<(Company, Session), GameError> {
        let company = self.company(id)?;
        let session = self.live_session(&company)?;
        if !matches!(session.stage, SessionStage::Game | SessionStage::ChangeTurn) {
            return Err(GameError::State(format!(
                "action not allowed in stage {}",
                session.stage
            )));
        }
        if company.in_prison {
            return Err(GameError::State(format!("company {id} is in prison")));
        }
        Ok((company, session))
    }
}

// ---------------------------------------------------------------------------
// Keyword-argument helpers for scheduled calls
// ---------------------------------------------------------------------------

pub(crate) fn kwarg_str<'a>(kwargs: &'a Map<String, Value>, key: &str) -> Result<&'a str, GameError> {
    kwargs
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| GameError::Scheduler(format!("missing string argument {key}")))
}

pub(crate) fn kwarg_u64(kwargs: &Map<String, Value>, key: &str) -> Result<u64, GameError> {
    kwargs
        .get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| GameError::Scheduler(format!("missing integer argument {key}")))
}

pub(crate) fn kwargs(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}
