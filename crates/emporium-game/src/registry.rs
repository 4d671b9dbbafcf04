//! Stable symbols for deferred calls.
//!
//! Both schedulers persist a symbol plus keyword arguments, never a
//! function reference. On replay the symbol is resolved here; a symbol
//! that no longer resolves is a [`GameError::Scheduler`].

use std::collections::BTreeMap;

use emporium_types::{CompanyId, SessionId};
use serde_json::{Map, Value};

use crate::error::GameError;
use crate::game::{Game, kwarg_str, kwarg_u64};

/// Advance a session to its next stage. Kwargs: `session_id`.
pub const STAGE_ADVANCE: &str = "stage.advance";
/// Release a company from prison. Kwargs: `company_id`.
pub const COMPANY_LEAVE_PRISON: &str = "company.leave_prison";
/// Clear the active session event. Kwargs: `session_id`.
pub const SESSION_CLEAR_EVENT: &str = "session.clear_event";

/// Handler behind a symbol.
pub type TaskFn = fn(&mut Game, &Map<String, Value>) -> Result<(), GameError>;

/// Symbol table.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    handlers: BTreeMap<&'static str, TaskFn>,
}

impl TaskRegistry {
    /// The registry with every engine symbol.
    pub fn standard() -> Self {
        let mut registry = Self::default();
        registry.register(STAGE_ADVANCE, stage_advance);
        registry.register(COMPANY_LEAVE_PRISON, company_leave_prison);
        registry.register(SESSION_CLEAR_EVENT, session_clear_event);
        registry
    }

    /// Bind `symbol` to `handler`, replacing any previous binding.
    pub fn register(&mut self, symbol: &'static str, handler: TaskFn) {
        self.handlers.insert(symbol, handler);
    }

    /// Handler for `symbol`.
    pub fn get(&self, symbol: &str) -> Option<TaskFn> {
        self.handlers.get(symbol).copied()
    }

    /// Whether `symbol` resolves.
    pub fn contains(&self, symbol: &str) -> bool {
        self.handlers.contains_key(symbol)
    }

    /// All symbols, sorted.
    pub fn symbols(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }
}

fn stage_advance(game: &mut Game, kwargs: &Map<String, Value>) -> Result<(), GameError> {
    let id = SessionId::from(kwarg_str(kwargs, "session_id")?);
    game.advance_stage(&id).map(|_| ())
}

fn company_leave_prison(game: &mut Game, kwargs: &Map<String, Value>) -> Result<(), GameError> {
    let id = CompanyId(kwarg_u64(kwargs, "company_id")?);
    game.leave_prison(id).map(|_| ())
}

fn session_clear_event(game: &mut Game, kwargs: &Map<String, Value>) -> Result<(), GameError> {
    let id = SessionId::from(kwarg_str(kwargs, "session_id")?);
    game.clear_event(&id)
}

impl Game {
    /// Resolve and run one deferred call.
    pub(crate) fn run_symbol(
        &mut self,
        symbol: &str,
        kwargs: &Map<String, Value>,
    ) -> Result<(), GameError> {
        let handler = self
            .tasks
            .get(symbol)
            .ok_or_else(|| GameError::Scheduler(format!("unknown task symbol {symbol}")))?;
        handler(self, kwargs)
    }

    pub(crate) fn require_symbol(&self, symbol: &str) -> Result<(), GameError> {
        if self.tasks.contains(symbol) {
            Ok(())
        } else {
            Err(GameError::Scheduler(format!("unknown task symbol {symbol}")))
        }
    }
}
