//! Pure credit, deposit and tax math.
//!
//! All intermediate values are [`Decimal`]; results are truncated toward
//! zero into whole money units, matching integer division on the
//! positive amounts the game deals in.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::BankError;
use crate::policy::{CreditCondition, CreditOffer, DepositCondition, DepositOffer};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Result of [`calc_credit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditTerms {
    /// Principal plus interest.
    pub total: i64,
    /// `total / turns`, truncated.
    pub per_turn: i64,
    /// Turns that accrue interest.
    pub charged_turns: u32,
}

/// Result of [`calc_deposit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositTerms {
    /// Income added each turn.
    pub per_turn: i64,
    /// Income over the full term.
    pub total_earned: i64,
}

fn to_money(value: Decimal, context: &'static str) -> Result<i64, BankError> {
    value
        .trunc()
        .to_i64()
        .ok_or(BankError::Overflow { context })
}

/// Credit repayment terms.
///
/// `charged_turns = max(0, turns - free_turns)`; the total is
/// `amount * (1 + percent * charged_turns / 100)` when any turn is charged,
/// otherwise just `amount`.
///
/// # Errors
///
/// Returns [`BankError::ZeroTerm`] for a zero-turn term and
/// [`BankError::Overflow`] if the total does not fit.
pub fn calc_credit(
    amount: i64,
    free_turns: u32,
    percent: Decimal,
    turns: u32,
) -> Result<CreditTerms, BankError> {
    if turns == 0 {
        return Err(BankError::ZeroTerm);
    }
    let charged_turns = turns.saturating_sub(free_turns);
    let principal = Decimal::from(amount);

    let total = if charged_turns == 0 {
        principal
    } else {
        let interest = principal
            .checked_mul(percent)
            .and_then(|v| v.checked_mul(Decimal::from(charged_turns)))
            .and_then(|v| v.checked_div(HUNDRED))
            .ok_or(BankError::Overflow {
                context: "credit interest",
            })?;
        principal
            .checked_add(interest)
            .ok_or(BankError::Overflow {
                context: "credit total",
            })?
    };

    let per_turn = total
        .checked_div(Decimal::from(turns))
        .ok_or(BankError::Overflow {
            context: "credit per turn",
        })?;

    Ok(CreditTerms {
        total: to_money(total, "credit total")?,
        per_turn: to_money(per_turn, "credit per turn")?,
        charged_turns,
    })
}

/// Deposit income terms: `per_turn = floor(amount * percent / 100)`,
/// `total_earned = per_turn * turns`.
///
/// # Errors
///
/// Returns [`BankError::ZeroTerm`] for a zero-turn term and
/// [`BankError::Overflow`] if the income does not fit.
pub fn calc_deposit(amount: i64, percent: Decimal, turns: u32) -> Result<DepositTerms, BankError> {
    if turns == 0 {
        return Err(BankError::ZeroTerm);
    }
    let per_turn = Decimal::from(amount)
        .checked_mul(percent)
        .and_then(|v| v.checked_div(HUNDRED))
        .ok_or(BankError::Overflow {
            context: "deposit income",
        })?;
    let per_turn = to_money(per_turn, "deposit income")?;
    let total_earned = per_turn
        .checked_mul(i64::from(turns))
        .ok_or(BankError::Overflow {
            context: "deposit total",
        })?;
    Ok(DepositTerms {
        per_turn,
        total_earned,
    })
}

/// Tax due on `income` at `rate` (a fraction), truncated. Non-positive
/// income owes nothing.
///
/// # Errors
///
/// Returns [`BankError::Overflow`] if the tax does not fit.
pub fn calc_tax(income: i64, rate: Decimal) -> Result<i64, BankError> {
    if income <= 0 || rate <= Decimal::ZERO {
        return Ok(0);
    }
    let tax = Decimal::from(income)
        .checked_mul(rate)
        .ok_or(BankError::Overflow { context: "tax" })?;
    to_money(tax, "tax")
}

/// Scale `value` by `factor`, truncated. Used for event multipliers.
///
/// # Errors
///
/// Returns [`BankError::Overflow`] if the product does not fit.
pub fn scale(value: i64, factor: Decimal) -> Result<i64, BankError> {
    let scaled = Decimal::from(value)
        .checked_mul(factor)
        .ok_or(BankError::Overflow { context: "scale" })?;
    to_money(scaled, "scale")
}

/// First credit condition whose band contains `reputation`.
///
/// # Errors
///
/// Returns [`BankError::NoEligibleOffer`] when no band matches or the
/// matching band has `possible = false`.
pub fn get_credit_conditions(
    offer: &CreditOffer,
    reputation: u32,
) -> Result<&CreditCondition, BankError> {
    offer
        .conditions
        .iter()
        .find(|c| c.on_reputation.contains(reputation))
        .filter(|c| c.possible)
        .ok_or(BankError::NoEligibleOffer { reputation })
}

/// First deposit condition whose band contains `reputation`.
///
/// # Errors
///
/// Returns [`BankError::NoEligibleOffer`] when no band matches or the
/// matching band has `possible = false`.
pub fn get_deposit_conditions(
    offer: &DepositOffer,
    reputation: u32,
) -> Result<&DepositCondition, BankError> {
    offer
        .conditions
        .iter()
        .find(|c| c.on_reputation.contains(reputation))
        .filter(|c| c.possible)
        .ok_or(BankError::NoEligibleOffer { reputation })
}

/// Whether a `turns`-long credit taken on `step_now` ends by `max_steps`.
pub const fn check_max_credit_steps(turns: u32, step_now: u32, max_steps: u32) -> bool {
    match step_now.checked_add(turns) {
        Some(end) => end <= max_steps,
        None => false,
    }
}

/// Whether a `turns`-long deposit opened on `step_now` ends by `max_steps`.
pub const fn check_max_deposit_steps(turns: u32, step_now: u32, max_steps: u32) -> bool {
    check_max_credit_steps(turns, step_now, max_steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ReputationRange;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap_or_default()
    }

    fn credit_offer() -> CreditOffer {
        CreditOffer {
            min: 100,
            max: 100_000,
            conditions: vec![
                CreditCondition {
                    on_reputation: ReputationRange { min: 0, max: 19 },
                    possible: false,
                    without_interest: 0,
                    percent: Decimal::ZERO,
                },
                CreditCondition {
                    on_reputation: ReputationRange { min: 20, max: 1000 },
                    possible: true,
                    without_interest: 2,
                    percent: dec("5"),
                },
            ],
        }
    }

    #[test]
    fn credit_without_charged_turns_returns_principal() {
        let terms = calc_credit(10_000, 5, dec("10"), 5).unwrap_or(CreditTerms {
            total: 0,
            per_turn: 0,
            charged_turns: 99,
        });
        assert_eq!(terms.total, 10_000);
        assert_eq!(terms.per_turn, 2_000);
        assert_eq!(terms.charged_turns, 0);
    }

    #[test]
    fn credit_interest_applies_to_charged_turns_only() {
        // 3 charged turns at 5%: 10000 * (1 + 0.15) = 11500
        let terms = calc_credit(10_000, 2, dec("5"), 5).ok();
        assert_eq!(
            terms,
            Some(CreditTerms {
                total: 11_500,
                per_turn: 2_300,
                charged_turns: 3,
            })
        );
    }

    #[test]
    fn credit_per_turn_truncates() {
        let terms = calc_credit(1_000, 0, dec("1"), 3).ok();
        // total = 1000 * 1.03 = 1030, per turn = 343.33 -> 343
        assert_eq!(terms.map(|t| (t.total, t.per_turn)), Some((1_030, 343)));
    }

    #[test]
    fn zero_term_is_rejected() {
        assert_eq!(calc_credit(100, 0, dec("1"), 0), Err(BankError::ZeroTerm));
        assert_eq!(calc_deposit(100, dec("1"), 0), Err(BankError::ZeroTerm));
    }

    #[test]
    fn deposit_income_is_floored() {
        let terms = calc_deposit(1_050, dec("3"), 4).ok();
        // 1050 * 3 / 100 = 31.5 -> 31
        assert_eq!(
            terms,
            Some(DepositTerms {
                per_turn: 31,
                total_earned: 124,
            })
        );
    }

    #[test]
    fn tax_is_truncated_and_never_negative() {
        assert_eq!(calc_tax(999, dec("0.1")), Ok(99));
        assert_eq!(calc_tax(-50, dec("0.1")), Ok(0));
        assert_eq!(calc_tax(100, Decimal::ZERO), Ok(0));
    }

    #[test]
    fn scale_truncates() {
        assert_eq!(scale(5, dec("1.5")), Ok(7));
        assert_eq!(scale(5, dec("0.5")), Ok(2));
    }

    #[test]
    fn conditions_pick_first_matching_band() {
        let offer = credit_offer();
        let cond = get_credit_conditions(&offer, 50).ok();
        assert_eq!(cond.map(|c| c.without_interest), Some(2));
    }

    #[test]
    fn impossible_band_is_not_eligible() {
        let offer = credit_offer();
        assert_eq!(
            get_credit_conditions(&offer, 10),
            Err(BankError::NoEligibleOffer { reputation: 10 })
        );
    }

    #[test]
    fn reputation_outside_all_bands_is_not_eligible() {
        let offer = DepositOffer {
            min: 1,
            max: 10,
            conditions: vec![DepositCondition {
                on_reputation: ReputationRange { min: 50, max: 100 },
                possible: true,
                percent: dec("2"),
            }],
        };
        assert!(get_deposit_conditions(&offer, 49).is_err());
        assert!(get_deposit_conditions(&offer, 100).is_ok());
    }

    #[test]
    fn term_must_end_by_last_step() {
        assert!(check_max_credit_steps(5, 10, 15));
        assert!(!check_max_credit_steps(6, 10, 15));
        assert!(!check_max_deposit_steps(u32::MAX, 1, 15));
    }

    #[test]
    fn amount_bounds() {
        let offer = credit_offer();
        assert!(offer.check_amount(100).is_ok());
        assert!(offer.check_amount(99).is_err());
        assert!(offer.check_amount(100_001).is_err());
    }
}
