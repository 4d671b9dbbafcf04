//! Per-turn company snapshots.

use emporium_types::{
    Company, CompanyId, Document, ExchangeStatus, SessionId, Statistic, StatisticId,
};
use serde_json::{Map, Value, json};

use crate::error::GameError;
use crate::exchange::ExchangeFilter;
use crate::game::Game;

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl Game {
    /// Store the snapshot of `company` for `step`. A second call for the
    /// same step replaces the first.
    pub(crate) fn record_statistic(&mut self, company: &Company, step: u32) -> Result<Statistic, GameError> {
        let filter = json!({
            "session_id": company.session_id,
            "company_id": company.id,
            "step": step,
        });
        let id = match self.store.find_one_typed::<Statistic>(&filter)? {
            Some(existing) => existing.id,
            None => StatisticId(self.store.next_id(Statistic::TABLE)?),
        };
        let open_offers = self
            .exchanges(
                &company.session_id,
                &ExchangeFilter {
                    seller: Some(company.id),
                    ..ExchangeFilter::default()
                },
            )?
            .iter()
            .filter(|o| matches!(o.status, ExchangeStatus::Active | ExchangeStatus::Pending))
            .count();
        let contracts = self
            .company_contracts(company.id)?
            .iter()
            .filter(|c| c.accepted)
            .count();

        let statistic = Statistic {
            id,
            session_id: company.session_id.clone(),
            company_id: company.id,
            step,
            balance: company.balance,
            reputation: company.reputation,
            economic_power: company.economic_power,
            tax_debt: company.tax_debt,
            credits: count(company.credits.len()),
            deposits: count(company.deposits.len()),
            in_prison: company.in_prison,
            business_type: company.business_type,
            factories: count(self.factories_of(company.id)?.len()),
            exchanges: count(open_offers),
            contracts: count(contracts),
            warehouse: company.warehouse_load(),
        };
        self.save(&statistic)?;
        Ok(statistic)
    }

    /// Snapshots of a session, optionally for one company, ordered by step
    /// then company.
    pub fn statistics(&self, session_id: &SessionId, company: Option<CompanyId>) -> Result<Vec<Statistic>, GameError> {
        let mut filter = Map::new();
        filter.insert(String::from("session_id"), json!(session_id));
        if let Some(company) = company {
            filter.insert(String::from("company_id"), json!(company));
        }
        let mut rows: Vec<Statistic> = self.store.find_typed(&Value::Object(filter))?;
        rows.sort_by_key(|s| (s.step, s.company_id));
        Ok(rows)
    }
}
