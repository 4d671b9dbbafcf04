//! Credits, deposits and taxes on company records.
//!
//! Player operations check eligibility and funds first, then mutate. The
//! per-turn accrual functions are called by the turn pipeline on a loaded
//! company and leave saving to it.

use std::sync::Arc;

use emporium_bank::{
    calc_credit, calc_deposit, calc_tax, check_max_credit_steps, check_max_deposit_steps,
    get_credit_conditions, get_deposit_conditions,
};
use emporium_types::{BusinessType, Company, CompanyId, Credit, Deposit, EventName};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, info};

use crate::error::GameError;
use crate::events::ActiveEffects;
use crate::game::Game;

fn validate_term(amount: i64, steps: u32) -> Result<(), GameError> {
    if amount <= 0 {
        return Err(GameError::Validation(String::from("amount must be positive")));
    }
    if steps == 0 {
        return Err(GameError::Validation(String::from("term must be at least one turn")));
    }
    Ok(())
}

impl Game {
    // -----------------------------------------------------------------------
    // Credits
    // -----------------------------------------------------------------------

    /// Borrow `amount` over `steps` turns.
    ///
    /// # Errors
    ///
    /// - [`GameError::Capacity`] at the per-company credit limit.
    /// - [`GameError::Validation`] for an amount outside the offer, a zero
    ///   term or a term running past the last step.
    /// - [`GameError::NoEligibleBankingOffer`] when the reputation band
    ///   offers no credit.
    pub fn take_credit(&mut self, id: CompanyId, amount: i64, steps: u32) -> Result<Company, GameError> {
        let (mut company, session) = self.acting_company(id)?;
        let catalog = Arc::clone(&self.catalog);
        let max = usize::try_from(catalog.settings.max_credits_per_company).unwrap_or(usize::MAX);
        if company.credits.len() >= max {
            return Err(GameError::Capacity(format!(
                "company {id} already has {} credits",
                company.credits.len()
            )));
        }
        validate_term(amount, steps)?;
        let offer = &catalog.capital.bank.credit;
        offer.check_amount(amount)?;
        if !check_max_credit_steps(steps, session.step, session.max_steps) {
            return Err(GameError::Validation(format!(
                "a {steps}-turn credit would end after the last step {}",
                session.max_steps
            )));
        }
        let condition = get_credit_conditions(offer, company.reputation)?;
        let terms = calc_credit(amount, condition.without_interest, condition.percent, steps)?;

        company.credits.push(Credit {
            amount,
            total_to_pay: terms.total,
            paid: 0,
            need_pay: 0,
            steps_total: steps,
            steps_now: 0,
        });
        self.credit_money(&mut company, amount)?;
        self.save(&company)?;
        info!(company_id = %id, amount, total = terms.total, steps, "credit taken");
        self.emit(
            EventName::CompanyCreditTaken,
            json!({
                "company_id": id,
                "amount": amount,
                "total_to_pay": terms.total,
                "per_turn": terms.per_turn,
                "steps": steps,
            }),
        );
        Ok(company)
    }

    /// Repay credit `index`. Overpayment is clamped to the remaining debt;
    /// paying less than what is currently due is refused.
    pub fn pay_credit(&mut self, id: CompanyId, index: usize, amount: i64) -> Result<Company, GameError> {
        let (mut company, _) = self.acting_company(id)?;
        let Some(credit) = company.credits.get(index).cloned() else {
            return Err(GameError::not_found("credit", index));
        };
        if amount <= 0 {
            return Err(GameError::Validation(String::from("amount must be positive")));
        }
        let remaining = credit.remaining();
        let pay = amount.min(remaining);
        let due = credit.need_pay.min(remaining);
        if pay < due {
            return Err(GameError::Validation(format!(
                "payment {amount} is below the amount due {due}"
            )));
        }
        self.debit_money(&mut company, pay)?;

        let paid = credit.paid.saturating_add(pay);
        let closed = paid >= credit.total_to_pay;
        if closed {
            company.credits.remove(index);
            self.add_reputation(&mut company, self.catalog.reputation.credit.gained);
        } else if let Some(c) = company.credits.get_mut(index) {
            c.paid = paid;
            c.need_pay = c.need_pay.saturating_sub(pay).max(0);
        }
        self.save(&company)?;
        self.emit(
            EventName::CompanyCreditPaid,
            json!({
                "company_id": id,
                "index": index,
                "amount": pay,
                "remaining": remaining.saturating_sub(pay),
            }),
        );
        if closed {
            info!(company_id = %id, index, "credit repaid");
            self.emit(
                EventName::CompanyCreditRemoved,
                json!({ "company_id": id, "index": index, "reason": "repaid" }),
            );
        }
        Ok(company)
    }

    /// Advance every credit by one turn. Overdue turns cost
    /// `credit.lost` reputation; past `credit.max_overdue` the credit is
    /// written off and the company ruined.
    pub(crate) fn accrue_credits(&mut self, company: &mut Company) -> Result<(), GameError> {
        let rules = self.catalog.reputation.credit;
        let mut overdue = 0_u32;
        let mut defaulted = Vec::new();

        for (idx, credit) in company.credits.iter_mut().enumerate() {
            if credit.steps_now < credit.steps_total {
                let outstanding = credit.remaining();
                if credit.steps_now.saturating_add(1) >= credit.steps_total {
                    credit.need_pay = outstanding;
                } else {
                    let left = i64::from(credit.steps_total.saturating_sub(credit.steps_now));
                    let share = outstanding
                        .saturating_sub(credit.need_pay)
                        .checked_div(left)
                        .unwrap_or(0);
                    credit.need_pay = credit.need_pay.saturating_add(share);
                }
                credit.steps_now = credit.steps_now.saturating_add(1);
            } else {
                credit.steps_now = credit.steps_now.saturating_add(1);
                if credit.steps_now.saturating_sub(credit.steps_total) > rules.max_overdue {
                    defaulted.push(idx);
                } else {
                    overdue = overdue.saturating_add(1);
                }
            }
        }

        for _ in 0..overdue {
            self.remove_reputation(company, rules.lost)?;
        }
        if !defaulted.is_empty() {
            for idx in defaulted.iter().rev() {
                company.credits.remove(*idx);
                self.emit(
                    EventName::CompanyCreditRemoved,
                    json!({ "company_id": company.id, "index": idx, "reason": "default" }),
                );
            }
            info!(company_id = %company.id, count = defaulted.len(), "credit default");
            self.ruin(company)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Deposits
    // -----------------------------------------------------------------------

    /// Lock `amount` in a deposit for `steps` turns.
    ///
    /// # Errors
    ///
    /// - [`GameError::Validation`] for a bad amount or term, or without
    ///   funds.
    /// - [`GameError::NoEligibleBankingOffer`] when the reputation band
    ///   offers no deposit.
    pub fn take_deposit(&mut self, id: CompanyId, amount: i64, steps: u32) -> Result<Company, GameError> {
        let (mut company, session) = self.acting_company(id)?;
        let catalog = Arc::clone(&self.catalog);
        validate_term(amount, steps)?;
        let offer = &catalog.capital.bank.contribution;
        offer.check_amount(amount)?;
        if !check_max_deposit_steps(steps, session.step, session.max_steps) {
            return Err(GameError::Validation(format!(
                "a {steps}-turn deposit would end after the last step {}",
                session.max_steps
            )));
        }
        let condition = get_deposit_conditions(offer, company.reputation)?;
        let terms = calc_deposit(amount, condition.percent, steps)?;

        self.debit_money(&mut company, amount)?;
        company.deposits.push(Deposit {
            amount,
            current_balance: amount,
            income_per_turn: terms.per_turn,
            total_earned: 0,
            steps_total: steps,
            steps_now: 0,
        });
        self.save(&company)?;
        info!(company_id = %id, amount, steps, per_turn = terms.per_turn, "deposit opened");
        self.emit(
            EventName::CompanyDepositTaken,
            json!({
                "company_id": id,
                "amount": amount,
                "income_per_turn": terms.per_turn,
                "steps": steps,
            }),
        );
        Ok(company)
    }

    /// Close deposit `index`. A matured deposit pays out its balance; an
    /// early withdrawal returns only the principal.
    pub fn withdraw_deposit(&mut self, id: CompanyId, index: usize) -> Result<Company, GameError> {
        let (mut company, _) = self.acting_company(id)?;
        if index >= company.deposits.len() {
            return Err(GameError::not_found("deposit", index));
        }
        self.close_deposit(&mut company, index)?;
        self.save(&company)?;
        Ok(company)
    }

    fn close_deposit(&mut self, company: &mut Company, index: usize) -> Result<(), GameError> {
        if index >= company.deposits.len() {
            return Ok(());
        }
        let deposit = company.deposits.remove(index);
        let early = !deposit.is_mature();
        let payout = if early {
            deposit.amount
        } else {
            deposit.current_balance
        };
        self.credit_money(company, payout)?;
        debug!(company_id = %company.id, index, payout, early, "deposit closed");
        self.emit(
            EventName::CompanyDepositWithdrawn,
            json!({
                "company_id": company.id,
                "index": index,
                "amount": payout,
                "early": early,
            }),
        );
        Ok(())
    }

    /// Accrue one turn of income on every deposit and pay out the matured
    /// ones, unless the company is in prison.
    pub(crate) fn accrue_deposits(&mut self, company: &mut Company) -> Result<(), GameError> {
        let mut matured = Vec::new();
        for (idx, deposit) in company.deposits.iter_mut().enumerate() {
            if deposit.steps_now < deposit.steps_total {
                deposit.current_balance = deposit
                    .current_balance
                    .checked_add(deposit.income_per_turn)
                    .ok_or_else(|| GameError::overflow("deposit balance"))?;
                deposit.total_earned = deposit.total_earned.saturating_add(deposit.income_per_turn);
                deposit.steps_now = deposit.steps_now.saturating_add(1);
            }
            if deposit.is_mature() && !company.in_prison {
                matured.push(idx);
            }
        }
        for idx in matured.into_iter().rev() {
            self.close_deposit(company, idx)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Taxes
    // -----------------------------------------------------------------------

    /// Pay toward the tax debt. Overpayment is clamped.
    pub fn pay_taxes(&mut self, id: CompanyId, amount: i64) -> Result<Company, GameError> {
        let (mut company, _) = self.acting_company(id)?;
        if company.tax_debt <= 0 {
            return Err(GameError::State(format!("company {id} owes no taxes")));
        }
        if amount <= 0 {
            return Err(GameError::Validation(String::from("amount must be positive")));
        }
        let pay = amount.min(company.tax_debt);
        self.debit_money(&mut company, pay)?;
        self.settle_tax(&mut company, pay);
        self.save(&company)?;
        Ok(company)
    }

    fn settle_tax(&mut self, company: &mut Company, pay: i64) {
        company.tax_debt = company.tax_debt.saturating_sub(pay);
        if company.tax_debt == 0 {
            company.overdue_steps = 0;
            self.add_reputation(company, self.catalog.reputation.tax.paid);
        }
        self.emit(
            EventName::CompanyTaxPaid,
            json!({
                "company_id": company.id,
                "amount": pay,
                "remaining": company.tax_debt,
            }),
        );
    }

    /// Tax step of the pipeline. Returns `true` when the company was jailed
    /// for unpaid taxes and the rest of its turn must be skipped.
    pub(crate) fn assess_taxes(&mut self, company: &mut Company, effects: &ActiveEffects) -> Result<bool, GameError> {
        let rules = self.catalog.reputation.tax;
        if company.tax_debt > 0 {
            company.overdue_steps = company.overdue_steps.saturating_add(1);
            self.remove_reputation(company, rules.late)?;
            if company.overdue_steps > rules.not_paid_stages {
                info!(
                    company_id = %company.id,
                    debt = company.tax_debt,
                    overdue = company.overdue_steps,
                    "unpaid taxes"
                );
                company.tax_debt = 0;
                company.overdue_steps = 0;
                self.ruin(company)?;
                return Ok(true);
            }
        }

        let policy = &self.catalog.capital.bank.tax;
        let base = match company.business_type {
            BusinessType::Big => policy.big_business,
            BusinessType::Small => policy.small_business,
        };
        let auto_pay = policy.auto_pay;
        let rate = base
            .checked_mul(effects.tax_factor(company.business_type))
            .unwrap_or(Decimal::ZERO);
        let tax = calc_tax(company.last_turn_income, rate)?;
        if tax > 0 {
            company.tax_debt = company
                .tax_debt
                .checked_add(tax)
                .ok_or_else(|| GameError::overflow("tax debt"))?;
            debug!(company_id = %company.id, tax, debt = company.tax_debt, "tax assessed");
            if auto_pay && company.balance >= company.tax_debt {
                let debt = company.tax_debt;
                self.debit_money(company, debt)?;
                self.settle_tax(company, debt);
            }
        }
        Ok(false)
    }
}
