//! Error types for the `emporium-game` crate.
//!
//! [`GameError`] is the client-facing taxonomy: every variant maps to a
//! stable snake_case [`kind`](GameError::kind) that the dispatcher puts in
//! error envelopes. Checks run before any mutation, so an error means no
//! state was changed.

use std::path::PathBuf;

use emporium_bank::BankError;
use emporium_store::StoreError;

/// Errors raised while loading or validating the catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A catalog file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A catalog file is not valid JSON for its schema.
    #[error("failed to parse {file}: {source}")]
    Parse {
        /// Catalog file name.
        file: &'static str,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Cross-file references do not resolve.
    #[error("invalid catalog: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

/// Errors returned by game operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// Argument shape, type or range is wrong.
    #[error("{0}")]
    Validation(String),

    /// Bad or missing password, or caller not an admin.
    #[error("{0}")]
    Auth(String),

    /// Referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// Requested id.
        id: String,
    },

    /// Entity exists but is not in the required state.
    #[error("{0}")]
    State(String),

    /// An invariant would be violated (warehouse full, limits reached).
    #[error("{0}")]
    Capacity(String),

    /// No reputation band offers the requested banking product.
    #[error("no eligible banking offer for reputation {reputation}")]
    NoEligibleBankingOffer {
        /// Reputation of the company.
        reputation: u32,
    },

    /// A scheduled symbol does not resolve, or a task failed.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// The document store failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// Banking math failed.
    #[error("bank error: {source}")]
    Bank {
        /// The underlying bank error.
        source: BankError,
    },

    /// The catalog is missing an entry the operation needs.
    #[error("catalog error: {source}")]
    Catalog {
        /// The underlying catalog error.
        #[from]
        source: CatalogError,
    },

    /// A payload could not be (de)serialized.
    #[error("serialization error: {source}")]
    Serialization {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

impl From<BankError> for GameError {
    fn from(source: BankError) -> Self {
        match source {
            BankError::NoEligibleOffer { reputation } => Self::NoEligibleBankingOffer { reputation },
            BankError::AmountOutOfRange { .. } | BankError::ZeroTerm => {
                Self::Validation(source.to_string())
            }
            BankError::Overflow { .. } => Self::Bank { source },
        }
    }
}

impl GameError {
    /// Stable tag for error envelopes.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Auth(_) => "auth",
            Self::NotFound { .. } => "not_found",
            Self::State(_) => "state",
            Self::Capacity(_) => "capacity",
            Self::NoEligibleBankingOffer { .. } => "no_eligible_banking_offer",
            Self::Scheduler(_) => "scheduler",
            Self::Store { .. } => "store",
            Self::Bank { .. } => "bank",
            Self::Catalog { .. } => "catalog",
            Self::Serialization { .. } => "serialization",
        }
    }

    /// Shorthand for [`GameError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for an arithmetic overflow in `context`.
    pub const fn overflow(context: &'static str) -> Self {
        Self::Bank {
            source: BankError::Overflow { context },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_errors_map_onto_client_taxonomy() {
        let err = GameError::from(BankError::NoEligibleOffer { reputation: 3 });
        assert_eq!(err.kind(), "no_eligible_banking_offer");

        let err = GameError::from(BankError::AmountOutOfRange {
            amount: 1,
            min: 10,
            max: 20,
        });
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("10..=20"));

        assert_eq!(GameError::overflow("x").kind(), "bank");
    }

    #[test]
    fn not_found_message() {
        let err = GameError::not_found("company", 7);
        assert_eq!(err.to_string(), "company 7 not found");
        assert_eq!(err.kind(), "not_found");
    }
}
