//! Game engine for the Emporium server.
//!
//! A single [`Game`] value owns every session of the process. Commands
//! are plain method calls that validate, mutate the document store and
//! queue broadcasts; the caller drains them with [`Game::drain_events`].
//! Time enters only through the [`Clock`] and the scheduler worker that
//! calls [`Game::run_due_tasks`].
//!
//! # Modules
//!
//! - [`catalog`] -- Immutable catalog loaded from `config/`
//! - [`clock`] -- [`Clock`] trait, [`SystemClock`] and [`ManualClock`]
//! - [`error`] -- [`GameError`] and [`CatalogError`]
//! - [`game`] -- The [`Game`] context and its outbox
//! - [`registry`] -- Stable symbols for deferred calls
//! - [`time_schedule`] -- Wall-clock tasks
//! - [`step_schedule`] -- Calls attached to a future turn
//! - [`session`] -- Sessions and map generation
//! - [`stages`] -- Session stage machine
//! - [`company`] -- Companies, warehouse, reputation, prison and banking
//! - [`user`] -- Users and company membership
//! - [`factory`] -- Factories and their production automaton
//! - [`exchange`] -- Sell offers with escrowed purchase requests
//! - [`contract`] -- Bilateral supply contracts
//! - [`events`] -- Random session events and their effects
//! - [`pipeline`] -- The per-turn accrual pipeline
//! - [`statistic`] -- Per-turn company snapshots

pub mod catalog;
pub mod clock;
pub mod company;
pub mod contract;
pub mod error;
pub mod events;
pub mod exchange;
pub mod factory;
pub mod game;
pub mod pipeline;
pub mod registry;
pub mod session;
pub mod stages;
pub mod statistic;
pub mod step_schedule;
pub mod time_schedule;
pub mod user;

#[cfg(test)]
mod testing;

pub use catalog::Catalog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CatalogError, GameError};
pub use events::ActiveEffects;
pub use exchange::{ExchangeFilter, ExchangePrice, FAILED_DEAL_PENALTY, REQUEST_TTL_TURNS};
pub use game::{Game, GameSettings};
pub use registry::{COMPANY_LEAVE_PRISON, SESSION_CLEAR_EVENT, STAGE_ADVANCE, TaskRegistry};
pub use session::position_key;
pub use time_schedule::NewTimeTask;
