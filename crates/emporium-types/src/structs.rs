//! Core entity records.
//!
//! Every entity is a document in the store, keyed by its native id field.
//! Entities reference each other by id only; services look related records
//! up through the store instead of holding aliases.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::Document;
use crate::enums::{BusinessType, DealType, ExchangeStatus, ImprovementKind, SessionStage};
use crate::ids::{
    CompanyId, ContractId, ExchangeId, FactoryId, SessionId, StatisticId, StepScheduleId,
    TimeTaskId, UserId,
};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Dimensions of a session map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSize {
    /// Number of rows (the `x` coordinate).
    pub rows: u32,
    /// Number of columns (the `y` coordinate).
    pub cols: u32,
}

impl MapSize {
    /// A square map with the given side.
    pub const fn square(side: u32) -> Self {
        Self {
            rows: side,
            cols: side,
        }
    }

    /// Flat cell index of `(x, y)`, or `None` when out of bounds.
    pub fn index(self, x: u32, y: u32) -> Option<usize> {
        if x >= self.rows || y >= self.cols {
            return None;
        }
        let idx = x.checked_mul(self.cols)?.checked_add(y)?;
        usize::try_from(idx).ok()
    }

    /// Total number of cells.
    pub fn cell_count(self) -> usize {
        self.rows
            .checked_mul(self.cols)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0)
    }
}

/// Final standing of one company when a session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    /// The company.
    pub company_id: CompanyId,
    /// Company name at the end of the game.
    pub name: String,
    /// Final balance.
    pub balance: i64,
    /// Final reputation.
    pub reputation: u32,
    /// Final economic power.
    pub economic_power: i64,
}

/// Rankings recorded when a session reaches `End`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    /// All companies ordered by balance, richest first.
    pub standings: Vec<Standing>,
    /// Highest balance.
    pub capital_winner: Option<CompanyId>,
    /// Highest reputation.
    pub reputation_winner: Option<CompanyId>,
    /// Highest economic power.
    pub economic_winner: Option<CompanyId>,
}

/// A game instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// 32-character alphanumeric code.
    pub session_id: SessionId,
    /// Current lifecycle stage.
    pub stage: SessionStage,
    /// 1-based turn index; 0 before the first turn.
    pub step: u32,
    /// Last playable turn.
    pub max_steps: u32,
    /// Map dimensions.
    pub map_size: MapSize,
    /// Flat cell-type ids, `rows * cols` long once generated.
    #[serde(default)]
    pub cells: Vec<String>,
    /// Number of cells of each type.
    #[serde(default)]
    pub cell_counts: BTreeMap<String, u32>,
    /// Pending stage-advancement task.
    #[serde(default)]
    pub change_turn_schedule_id: Option<TimeTaskId>,
    /// Active event id.
    #[serde(default)]
    pub event_type: Option<String>,
    /// Step the active event started on.
    #[serde(default)]
    pub event_start: Option<u32>,
    /// Step the active event ends on.
    #[serde(default)]
    pub event_end: Option<u32>,
    /// Rankings, set when the session ends.
    #[serde(default)]
    pub result: Option<GameResult>,
}

impl Session {
    /// Cell-type id at `(x, y)`.
    pub fn cell_at(&self, x: u32, y: u32) -> Option<&str> {
        let idx = self.map_size.index(x, y)?;
        self.cells.get(idx).map(String::as_str)
    }
}

impl Document for Session {
    const TABLE: &'static str = "sessions";
    const KEY: &'static str = "session_id";

    fn key(&self) -> Value {
        Value::from(&self.session_id)
    }
}

// ---------------------------------------------------------------------------
// Company
// ---------------------------------------------------------------------------

/// An outstanding bank credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    /// Principal that was credited to the balance.
    pub amount: i64,
    /// Principal plus interest.
    pub total_to_pay: i64,
    /// Repaid so far.
    pub paid: i64,
    /// Currently due.
    pub need_pay: i64,
    /// Scheduled number of turns.
    pub steps_total: u32,
    /// Turns elapsed, including overdue ones.
    pub steps_now: u32,
}

impl Credit {
    /// Amount still owed.
    pub const fn remaining(&self) -> i64 {
        self.total_to_pay.saturating_sub(self.paid)
    }
}

/// A bank deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    /// Principal withdrawn from the balance.
    pub amount: i64,
    /// Principal plus accrued income.
    pub current_balance: i64,
    /// Income added each turn.
    pub income_per_turn: i64,
    /// Income accrued so far.
    pub total_earned: i64,
    /// Term in turns.
    pub steps_total: u32,
    /// Turns elapsed.
    pub steps_now: u32,
}

impl Deposit {
    /// Whether the term has been served.
    pub const fn is_mature(&self) -> bool {
        self.steps_now >= self.steps_total
    }
}

/// A player-controlled economic actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Unique id.
    pub id: CompanyId,
    /// Name, unique within the session.
    pub name: String,
    /// Owning session.
    pub session_id: SessionId,
    /// Creating user; `UserId(0)` when unset.
    pub owner: UserId,
    /// Members.
    #[serde(default)]
    pub users: Vec<UserId>,
    /// Money.
    pub balance: i64,
    /// Reputation, never negative.
    pub reputation: u32,
    /// Balance plus warehouse value at base prices.
    #[serde(default)]
    pub economic_power: i64,
    /// Map cell as `"x.y"`.
    #[serde(default)]
    pub cell_position: Option<String>,
    /// Resource id to stored amount.
    #[serde(default)]
    pub warehouses: BTreeMap<String, u32>,
    /// Improvement kind to level.
    #[serde(default)]
    pub improvements: BTreeMap<String, u32>,
    /// Outstanding credits.
    #[serde(default)]
    pub credits: Vec<Credit>,
    /// Running deposits.
    #[serde(default)]
    pub deposits: Vec<Deposit>,
    /// Unpaid taxes.
    #[serde(default)]
    pub tax_debt: i64,
    /// Consecutive turns with unpaid taxes.
    #[serde(default)]
    pub overdue_steps: u32,
    /// Income of the previous turn.
    #[serde(default)]
    pub last_turn_income: i64,
    /// Income accumulated during the current turn.
    #[serde(default)]
    pub this_turn_income: i64,
    /// Tax bracket.
    #[serde(default)]
    pub business_type: BusinessType,
    /// Whether the company is jailed.
    #[serde(default)]
    pub in_prison: bool,
    /// Step on which the company is released.
    #[serde(default)]
    pub prison_end_step: Option<u32>,
    /// Six-digit join code, unique across companies.
    pub secret_code: u32,
}

impl Company {
    /// Amount of `resource` in the warehouse.
    pub fn resource_amount(&self, resource: &str) -> u32 {
        self.warehouses.get(resource).copied().unwrap_or(0)
    }

    /// Total units stored across all resources.
    pub fn warehouse_load(&self) -> u32 {
        self.warehouses
            .values()
            .fold(0_u32, |acc, v| acc.saturating_add(*v))
    }

    /// Current level of an improvement (0 when never set).
    pub fn improvement_level(&self, kind: ImprovementKind) -> u32 {
        self.improvements.get(kind.as_str()).copied().unwrap_or(0)
    }

    /// Parsed `(x, y)` cell position.
    pub fn position(&self) -> Option<(u32, u32)> {
        let raw = self.cell_position.as_deref()?;
        let (x, y) = raw.split_once('.')?;
        Some((x.parse().ok()?, y.parse().ok()?))
    }
}

impl Document for Company {
    const TABLE: &'static str = "companies";
    const KEY: &'static str = "id";

    fn key(&self) -> Value {
        Value::from(self.id)
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A participant of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// External chat id.
    pub id: UserId,
    /// Display name, unique within the session.
    pub username: String,
    /// Session joined.
    pub session_id: SessionId,
    /// Company joined, if any.
    #[serde(default)]
    pub company_id: Option<CompanyId>,
}

impl Document for User {
    const TABLE: &'static str = "users";
    const KEY: &'static str = "id";

    fn key(&self) -> Value {
        Value::from(self.id)
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// A production unit owned by a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Factory {
    /// Unique id.
    pub id: FactoryId,
    /// Owner.
    pub company_id: CompanyId,
    /// Resource the factory is tooled for.
    #[serde(default)]
    pub complectation: Option<String>,
    /// `[elapsed, required]` production turns.
    #[serde(default)]
    pub progress: [u32; 2],
    /// One-shot intent to produce a batch.
    #[serde(default)]
    pub produce: bool,
    /// Restart automatically when materials are present.
    #[serde(default)]
    pub is_auto: bool,
    /// Remaining retooling turns.
    #[serde(default)]
    pub complectation_stages: u32,
    /// Lifetime output.
    #[serde(default)]
    pub produced: u32,
}

impl Factory {
    /// Whether a batch is in flight (materials already consumed).
    pub const fn in_production(&self) -> bool {
        self.progress[0] > 0
    }

    /// Idle: no tooling, or tooled but neither retooling nor producing.
    pub const fn is_idle(&self) -> bool {
        self.complectation.is_none()
            || (self.complectation_stages == 0 && self.progress[0] == 0 && !self.produce)
    }
}

impl Document for Factory {
    const TABLE: &'static str = "factories";
    const KEY: &'static str = "id";

    fn key(&self) -> Value {
        Value::from(self.id)
    }
}

// ---------------------------------------------------------------------------
// Exchange
// ---------------------------------------------------------------------------

/// An escrowed request to buy an active offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Buyer.
    pub company_id: CompanyId,
    /// Turn the request was placed on.
    pub created_turn: u32,
}

/// A sell offer on the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// Unique id.
    pub id: ExchangeId,
    /// Session the offer lives in.
    pub session_id: SessionId,
    /// Seller.
    pub seller_company_id: CompanyId,
    /// Accepted buyer.
    #[serde(default)]
    pub buyer_company_id: Option<CompanyId>,
    /// Payment kind.
    pub deal_type: DealType,
    /// Resource offered.
    pub offer_resource: String,
    /// Units offered.
    pub offer_amount: u32,
    /// Money price for `DealType::Money`.
    #[serde(default)]
    pub price_money: i64,
    /// Barter resource for `DealType::Barter`.
    #[serde(default)]
    pub barter_resource: Option<String>,
    /// Barter units for `DealType::Barter`.
    #[serde(default)]
    pub barter_amount: u32,
    /// Lifecycle status.
    pub status: ExchangeStatus,
    /// Escrowed requests while `Active`.
    #[serde(default)]
    pub purchase_requests: Vec<PurchaseRequest>,
    /// Last turn the seller may ship on.
    #[serde(default)]
    pub delivery_deadline_turn: Option<u32>,
    /// Whether the seller shipped.
    #[serde(default)]
    pub goods_sent: bool,
    /// Turn the offer was listed on.
    pub created_turn: u32,
}

impl Exchange {
    /// Whether `company` holds a request on this offer.
    pub fn has_request_from(&self, company: CompanyId) -> bool {
        self.purchase_requests
            .iter()
            .any(|r| r.company_id == company)
    }
}

impl Document for Exchange {
    const TABLE: &'static str = "exchanges";
    const KEY: &'static str = "id";

    fn key(&self) -> Value {
        Value::from(self.id)
    }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// A recurring bilateral supply agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Unique id.
    pub id: ContractId,
    /// Session the contract lives in.
    pub session_id: SessionId,
    /// Delivering company.
    pub supplier_company_id: CompanyId,
    /// Paying company.
    pub customer_company_id: CompanyId,
    /// Resource delivered.
    pub resource: String,
    /// Units per delivery.
    pub amount_per_turn: u32,
    /// Number of turns (and deliveries) agreed.
    pub duration_turns: u32,
    /// Total payment, escrowed from the customer at acceptance.
    pub payment_amount: i64,
    /// Whether the supplier accepted.
    #[serde(default)]
    pub accepted: bool,
    /// Deliveries made.
    #[serde(default)]
    pub successful_deliveries: u32,
    /// Whether this turn's delivery happened.
    #[serde(default)]
    pub delivered_this_turn: bool,
    /// Turns elapsed since acceptance.
    #[serde(default)]
    pub turns_passed: u32,
    /// Turn the contract was proposed on.
    pub created_turn: u32,
}

impl Contract {
    /// Whether `company` is a party.
    pub fn involves(&self, company: CompanyId) -> bool {
        self.supplier_company_id == company || self.customer_company_id == company
    }
}

impl Document for Contract {
    const TABLE: &'static str = "contracts";
    const KEY: &'static str = "id";

    fn key(&self) -> Value {
        Value::from(self.id)
    }
}

// ---------------------------------------------------------------------------
// Schedules
// ---------------------------------------------------------------------------

/// A registered symbol plus its keyword arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledCall {
    /// Registry symbol, e.g. `company.leave_prison`.
    pub function_path: String,
    /// Keyword arguments passed to the handler.
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

/// Deferred calls attached to `(session_id, in_step)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSchedule {
    /// Unique id.
    pub id: StepScheduleId,
    /// Session.
    pub session_id: SessionId,
    /// Turn on which the calls run.
    pub in_step: u32,
    /// Calls in insertion order.
    #[serde(default)]
    pub calls: Vec<ScheduledCall>,
}

impl Document for StepSchedule {
    const TABLE: &'static str = "step_schedule";
    const KEY: &'static str = "id";

    fn key(&self) -> Value {
        Value::from(self.id)
    }
}

/// A wall-clock task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeTask {
    /// Unique id.
    pub id: TimeTaskId,
    /// Registry symbol.
    pub function_path: String,
    /// When the task becomes due.
    pub execute_at: DateTime<Utc>,
    /// When the task was (re)scheduled.
    pub add_at: DateTime<Utc>,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Keyword arguments.
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    /// Reschedule after each run.
    #[serde(default)]
    pub repeat: bool,
    /// Remove at boot and shutdown instead of replaying.
    #[serde(default)]
    pub delete_on_shutdown: bool,
}

impl Document for TimeTask {
    const TABLE: &'static str = "time_schedule";
    const KEY: &'static str = "id";

    fn key(&self) -> Value {
        Value::from(self.id)
    }
}

// ---------------------------------------------------------------------------
// Statistic
// ---------------------------------------------------------------------------

/// Snapshot of a company at the end of a turn's accrual pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistic {
    /// Unique id.
    pub id: StatisticId,
    /// Session.
    pub session_id: SessionId,
    /// Company.
    pub company_id: CompanyId,
    /// Turn.
    pub step: u32,
    /// Balance.
    pub balance: i64,
    /// Reputation.
    pub reputation: u32,
    /// Economic power.
    pub economic_power: i64,
    /// Unpaid taxes.
    pub tax_debt: i64,
    /// Outstanding credits.
    pub credits: u32,
    /// Running deposits.
    pub deposits: u32,
    /// Jailed.
    pub in_prison: bool,
    /// Tax bracket.
    pub business_type: BusinessType,
    /// Factories owned.
    pub factories: u32,
    /// Offers listed by the company that are not terminal.
    pub exchanges: u32,
    /// Accepted contracts the company is party to.
    pub contracts: u32,
    /// Units in the warehouse.
    pub warehouse: u32,
}

impl Document for Statistic {
    const TABLE: &'static str = "statistics";
    const KEY: &'static str = "id";

    fn key(&self) -> Value {
        Value::from(self.id)
    }
}
