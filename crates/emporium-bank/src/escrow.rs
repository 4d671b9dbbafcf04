//! Escrow bookkeeping for exchanges and contracts.
//!
//! Every unit the engine withholds from a buyer or customer is recorded as
//! `Reserved`; every exit path records the same units as `Refunded` (back
//! to the payer) or `Delivered` (on to the counterparty). For a resolved
//! deal the conservation check is:
//!
//! ```text
//! sum(reserved) == sum(refunded) + sum(delivered)
//! ```
//!
//! per asset. A violation is returned as an [`EscrowImbalance`]. The book
//! is a process-local audit trail; balances themselves live on companies.

use std::collections::BTreeMap;

use emporium_types::{CompanyId, ContractId, ExchangeId};
use tracing::warn;

/// The deal an escrow belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DealRef {
    /// An exchange offer.
    Exchange(ExchangeId),
    /// A supply contract.
    Contract(ContractId),
}

/// What is held.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Asset {
    /// Money.
    Money,
    /// Units of a resource.
    Resource(String),
}

/// Direction of an escrow movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowFlow {
    /// Withheld from the payer.
    Reserved,
    /// Returned to the payer.
    Refunded,
    /// Paid out to the counterparty.
    Delivered,
}

/// One escrow movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowEntry {
    /// Deal.
    pub deal: DealRef,
    /// Company the units moved from or to.
    pub party: CompanyId,
    /// What moved.
    pub asset: Asset,
    /// How many units.
    pub amount: i64,
    /// Direction.
    pub flow: EscrowFlow,
}

/// Conservation violation for one deal and asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowImbalance {
    /// Deal.
    pub deal: DealRef,
    /// Asset.
    pub asset: Asset,
    /// Units reserved.
    pub reserved: i64,
    /// Units released (refunded plus delivered).
    pub released: i64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    reserved: i64,
    released: i64,
}

/// Append-only escrow log.
#[derive(Debug, Clone, Default)]
pub struct EscrowBook {
    entries: Vec<EscrowEntry>,
}

impl EscrowBook {
    /// An empty book.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record a movement.
    pub fn record(&mut self, deal: DealRef, party: CompanyId, asset: Asset, amount: i64, flow: EscrowFlow) {
        self.entries.push(EscrowEntry {
            deal,
            party,
            asset,
            amount,
            flow,
        });
    }

    /// All entries for `deal`, in order.
    pub fn entries_for(&self, deal: DealRef) -> impl Iterator<Item = &EscrowEntry> {
        self.entries.iter().filter(move |e| e.deal == deal)
    }

    fn totals(&self, deal: DealRef) -> BTreeMap<Asset, Totals> {
        let mut totals: BTreeMap<Asset, Totals> = BTreeMap::new();
        for entry in self.entries_for(deal) {
            let t = totals.entry(entry.asset.clone()).or_default();
            match entry.flow {
                EscrowFlow::Reserved => t.reserved = t.reserved.saturating_add(entry.amount),
                EscrowFlow::Refunded | EscrowFlow::Delivered => {
                    t.released = t.released.saturating_add(entry.amount);
                }
            }
        }
        totals
    }

    /// Units of each asset still held for `deal`.
    pub fn outstanding(&self, deal: DealRef) -> BTreeMap<Asset, i64> {
        self.totals(deal)
            .into_iter()
            .map(|(asset, t)| (asset, t.reserved.saturating_sub(t.released)))
            .filter(|(_, held)| *held != 0)
            .collect()
    }

    /// Check conservation for a resolved deal.
    ///
    /// # Errors
    ///
    /// Returns every asset whose reserved total differs from its released
    /// total.
    pub fn verify_resolved(&self, deal: DealRef) -> Result<(), Vec<EscrowImbalance>> {
        let imbalances: Vec<EscrowImbalance> = self
            .totals(deal)
            .into_iter()
            .filter(|(_, t)| t.reserved != t.released)
            .map(|(asset, t)| EscrowImbalance {
                deal,
                asset,
                reserved: t.reserved,
                released: t.released,
            })
            .collect();
        if imbalances.is_empty() {
            Ok(())
        } else {
            for i in &imbalances {
                warn!(deal = ?i.deal, asset = ?i.asset, reserved = i.reserved, released = i.released, "escrow imbalance");
            }
            Err(imbalances)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEAL: DealRef = DealRef::Exchange(ExchangeId(1));

    #[test]
    fn refund_and_delivery_balance_reserve() {
        let mut book = EscrowBook::new();
        book.record(DEAL, CompanyId(2), Asset::Money, 500, EscrowFlow::Reserved);
        book.record(DEAL, CompanyId(3), Asset::Money, 500, EscrowFlow::Reserved);
        assert_eq!(book.outstanding(DEAL).get(&Asset::Money), Some(&1000));

        book.record(DEAL, CompanyId(3), Asset::Money, 500, EscrowFlow::Refunded);
        book.record(DEAL, CompanyId(1), Asset::Money, 500, EscrowFlow::Delivered);
        assert!(book.outstanding(DEAL).is_empty());
        assert_eq!(book.verify_resolved(DEAL), Ok(()));
    }

    #[test]
    fn double_release_is_detected() {
        let mut book = EscrowBook::new();
        let wood = Asset::Resource(String::from("wood"));
        book.record(DEAL, CompanyId(2), wood.clone(), 10, EscrowFlow::Reserved);
        book.record(DEAL, CompanyId(2), wood.clone(), 10, EscrowFlow::Refunded);
        book.record(DEAL, CompanyId(1), wood.clone(), 10, EscrowFlow::Delivered);
        let err = book.verify_resolved(DEAL).err().unwrap_or_default();
        assert_eq!(err.len(), 1);
        assert_eq!(err.first().map(|i| i.released), Some(20));
    }

    #[test]
    fn deals_are_tracked_separately() {
        let mut book = EscrowBook::new();
        let other = DealRef::Contract(ContractId(1));
        book.record(DEAL, CompanyId(2), Asset::Money, 5, EscrowFlow::Reserved);
        book.record(other, CompanyId(2), Asset::Money, 7, EscrowFlow::Reserved);
        assert_eq!(book.entries_for(other).count(), 1);
        assert_eq!(book.outstanding(DEAL).get(&Asset::Money), Some(&5));
    }
}
