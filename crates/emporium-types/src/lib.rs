//! Shared type definitions for the Emporium game server.
//!
//! This crate is the single source of truth for the records that flow
//! between the store, the game engine and the WebSocket server.
//!
//! # Modules
//!
//! - [`ids`] -- Typed wrappers for entity identifiers
//! - [`enums`] -- Session stages, business types, exchange states
//! - [`structs`] -- Entity records (session, company, factory, ...)
//! - [`document`] -- The [`Document`] trait binding records to store tables
//! - [`events`] -- Broadcast event names and payload wrapper

pub mod document;
pub mod enums;
pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use document::Document;
pub use enums::{BusinessType, DealType, ExchangeStatus, ImprovementKind, SessionStage};
pub use events::{ApiEvent, EventName};
pub use ids::{
    CompanyId, ContractId, ExchangeId, FactoryId, SessionId, StatisticId, StepScheduleId,
    TimeTaskId, UserId,
};
pub use structs::{
    Company, Contract, Credit, Deposit, Exchange, Factory, GameResult, MapSize, PurchaseRequest,
    ScheduledCall, Session, Standing, Statistic, StepSchedule, TimeTask, User,
};
