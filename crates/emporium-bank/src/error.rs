//! Error types for the bank module.

/// Errors returned by the bank's pure functions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BankError {
    /// No configured reputation band offers this product.
    #[error("no eligible banking offer for reputation {reputation}")]
    NoEligibleOffer {
        /// Reputation of the applicant.
        reputation: u32,
    },

    /// The requested amount is outside the configured bounds.
    #[error("amount {amount} outside allowed range {min}..={max}")]
    AmountOutOfRange {
        /// Requested amount.
        amount: i64,
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },

    /// The term must be at least one turn.
    #[error("term must be at least one turn")]
    ZeroTerm,

    /// A money computation overflowed.
    #[error("arithmetic overflow computing {context}")]
    Overflow {
        /// What was being computed.
        context: &'static str,
    },
}
