//! Banking policy loaded from the `capital` catalog.
//!
//! Rates are [`Decimal`] so that interest and tax math stays exact; the
//! catalog JSON may give them as numbers or strings.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BankError;

/// Inclusive reputation band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationRange {
    /// Lowest reputation in the band.
    pub min: i64,
    /// Highest reputation in the band.
    pub max: i64,
}

impl ReputationRange {
    /// Whether `reputation` falls in the band.
    pub fn contains(self, reputation: u32) -> bool {
        let rep = i64::from(reputation);
        self.min <= rep && rep <= self.max
    }
}

/// Credit terms for one reputation band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCondition {
    /// Band the terms apply to.
    pub on_reputation: ReputationRange,
    /// Whether credit is offered at all.
    pub possible: bool,
    /// Leading turns charged no interest.
    #[serde(default)]
    pub without_interest: u32,
    /// Interest percent per charged turn.
    #[serde(default)]
    pub percent: Decimal,
}

/// Deposit terms for one reputation band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositCondition {
    /// Band the terms apply to.
    pub on_reputation: ReputationRange,
    /// Whether deposits are accepted at all.
    pub possible: bool,
    /// Income percent per turn.
    #[serde(default)]
    pub percent: Decimal,
}

/// Credit product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditOffer {
    /// Smallest principal.
    pub min: i64,
    /// Largest principal.
    pub max: i64,
    /// Terms by reputation, first match wins.
    #[serde(default)]
    pub conditions: Vec<CreditCondition>,
}

/// Deposit product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositOffer {
    /// Smallest principal.
    pub min: i64,
    /// Largest principal.
    pub max: i64,
    /// Terms by reputation, first match wins.
    #[serde(default)]
    pub conditions: Vec<DepositCondition>,
}

/// Tax rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPolicy {
    /// Pay new tax from the balance automatically when possible.
    #[serde(default)]
    pub auto_pay: bool,
    /// Rate for small businesses (fraction of income).
    pub small_business: Decimal,
    /// Rate for big businesses (fraction of income).
    pub big_business: Decimal,
    /// Previous-turn income at which a company becomes big.
    pub big_on: i64,
}

/// `Capital.bank`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankPolicy {
    /// Credits.
    pub credit: CreditOffer,
    /// Deposits (`contribution` in the catalog).
    #[serde(alias = "deposit")]
    pub contribution: DepositOffer,
    /// Taxes.
    pub tax: TaxPolicy,
}

fn check_range(amount: i64, min: i64, max: i64) -> Result<(), BankError> {
    if amount < min || amount > max {
        return Err(BankError::AmountOutOfRange { amount, min, max });
    }
    Ok(())
}

impl CreditOffer {
    /// Validate a requested principal.
    ///
    /// # Errors
    ///
    /// Returns [`BankError::AmountOutOfRange`] outside `min..=max`.
    pub fn check_amount(&self, amount: i64) -> Result<(), BankError> {
        check_range(amount, self.min, self.max)
    }
}

impl DepositOffer {
    /// Validate a requested principal.
    ///
    /// # Errors
    ///
    /// Returns [`BankError::AmountOutOfRange`] outside `min..=max`.
    pub fn check_amount(&self, amount: i64) -> Result<(), BankError> {
        check_range(amount, self.min, self.max)
    }
}
