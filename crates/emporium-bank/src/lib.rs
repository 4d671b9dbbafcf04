//! Bank module for the Emporium game server.
//!
//! Pure functions for credit and deposit terms, tax computation and
//! eligibility by reputation band, plus an [`EscrowBook`] that records
//! every reservation and release made by exchanges and contracts so the
//! conservation law can be checked per deal.
//!
//! The crate holds no game state: callers pass in the relevant policy
//! section and the numbers, and apply the results themselves.
//!
//! # Modules
//!
//! - [`policy`] -- Banking policy types deserialized from the catalog
//! - [`math`] -- Credit, deposit and tax math
//! - [`escrow`] -- Escrow bookkeeping and conservation checks
//! - [`error`] -- [`BankError`]

pub mod error;
pub mod escrow;
pub mod math;
pub mod policy;

pub use error::BankError;
pub use escrow::{Asset, DealRef, EscrowBook, EscrowEntry, EscrowFlow, EscrowImbalance};
pub use math::{
    CreditTerms, DepositTerms, calc_credit, calc_deposit, calc_tax, check_max_credit_steps,
    check_max_deposit_steps, get_credit_conditions, get_deposit_conditions, scale,
};
pub use policy::{
    BankPolicy, CreditCondition, CreditOffer, DepositCondition, DepositOffer, ReputationRange,
    TaxPolicy,
};
