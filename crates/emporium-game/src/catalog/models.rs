//! Typed catalog records.
//!
//! Field names follow the catalog JSON (`basePrice`, `productsPerTurn`,
//! ...). Rates and multipliers are [`Decimal`].

use std::collections::BTreeMap;

use emporium_bank::BankPolicy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Recipe of a producible resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    /// Inputs consumed when a batch starts.
    #[serde(default)]
    pub materials: BTreeMap<String, u32>,
    /// Turns a batch takes.
    pub turns: u32,
    /// Units produced per batch.
    pub output: u32,
}

/// A tradeable resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Display name.
    pub label: String,
    /// Display emoji.
    #[serde(default)]
    pub emoji: String,
    /// Reference price used for economic power.
    #[serde(rename = "basePrice")]
    pub base_price: i64,
    /// Logistics weight factor.
    #[serde(rename = "massModifier", default)]
    pub mass_modifier: Decimal,
    /// Extracted from cells, never produced.
    #[serde(default)]
    pub raw: bool,
    /// Technology level; retooling time depends on it.
    #[serde(default, alias = "lvl")]
    pub level: u32,
    /// Recipe, when producible.
    #[serde(default)]
    pub production: Option<Production>,
}

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// Reference point of a fixed cell placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// `rows / 2, cols / 2`.
    Center,
    /// Anywhere on the map.
    Random,
    /// Row 0, column 0.
    TopLeft,
    /// Row 0, last column.
    TopRight,
    /// Last row, column 0.
    BottomLeft,
    /// Last row, last column.
    BottomRight,
}

impl Anchor {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "center" => Some(Self::Center),
            "random" => Some(Self::Random),
            "top_left" | "left-top" => Some(Self::TopLeft),
            "top_right" | "right-top" => Some(Self::TopRight),
            "bottom_left" | "left-bottom" => Some(Self::BottomLeft),
            "bottom_right" | "right-bottom" => Some(Self::BottomRight),
            _ => None,
        }
    }
}

/// A parsed location such as `center_-1_1`.
///
/// `dx` shifts the column and `dy` the row; the result is clamped to the
/// map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Reference point.
    pub anchor: Anchor,
    /// Column offset.
    pub dx: i64,
    /// Row offset.
    pub dy: i64,
}

impl Location {
    /// Parse `anchor` or `anchor_dx_dy`.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(anchor) = Anchor::parse(raw) {
            return Some(Self {
                anchor,
                dx: 0,
                dy: 0,
            });
        }
        let mut parts = raw.rsplitn(3, '_');
        let dy = parts.next()?.parse().ok()?;
        let dx = parts.next()?.parse().ok()?;
        let anchor = Anchor::parse(parts.next()?)?;
        Some(Self { anchor, dx, dy })
    }
}

/// A map cell type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellType {
    /// Display name.
    pub label: String,
    /// Raw resource extracted on this cell.
    #[serde(default, rename = "resource", alias = "resource_id")]
    pub resource_id: Option<String>,
    /// Maximum number of fixed placements.
    #[serde(default = "default_max_amount")]
    pub max_amount: u32,
    /// Whether a company may settle here.
    #[serde(default)]
    pub pickable: bool,
    /// Fixed placements.
    #[serde(default)]
    pub locations: Vec<String>,
}

const fn default_max_amount() -> u32 {
    1
}

impl CellType {
    /// Parsed fixed placements, capped at `max_amount`.
    pub fn placements(&self) -> Vec<Location> {
        let cap = usize::try_from(self.max_amount).unwrap_or(usize::MAX);
        self.locations
            .iter()
            .filter_map(|raw| Location::parse(raw))
            .take(cap)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Improvements
// ---------------------------------------------------------------------------

/// One level of an improvement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImprovementLevel {
    /// Upgrade price.
    pub cost: i64,
    /// Warehouse capacity.
    #[serde(default)]
    pub capacity: Option<u32>,
    /// Maximum concurrent contracts.
    #[serde(default)]
    pub max: Option<u32>,
    /// Station extraction per turn.
    #[serde(default, rename = "productsPerTurn")]
    pub products_per_turn: Option<u32>,
    /// Factory tasks per turn.
    #[serde(default, rename = "tasksPerTurn")]
    pub tasks_per_turn: Option<u32>,
    /// Factory count at this level.
    #[serde(default)]
    pub factories: Option<u32>,
}

/// Levels keyed by number.
pub type Levels = BTreeMap<u32, ImprovementLevel>;

/// Station and factory tables of one cell type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellImprovements {
    /// Extraction station.
    #[serde(default)]
    pub station: Levels,
    /// Factory block.
    #[serde(default)]
    pub factory: Levels,
}

/// `improvements.json`.
///
/// Decoded through a plain map so that integer level keys of the per-cell
/// tables parse the same way as the top-level ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, serde_json::Value>")]
pub struct Improvements {
    /// Warehouse levels.
    #[serde(default)]
    pub warehouse: Levels,
    /// Contract slot levels.
    #[serde(default)]
    pub contracts: Levels,
    /// Station and factory tables by cell type.
    #[serde(flatten)]
    pub by_cell: BTreeMap<String, CellImprovements>,
}

impl TryFrom<BTreeMap<String, serde_json::Value>> for Improvements {
    type Error = serde_json::Error;

    fn try_from(mut raw: BTreeMap<String, serde_json::Value>) -> Result<Self, Self::Error> {
        let warehouse = raw
            .remove("warehouse")
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        let contracts = raw
            .remove("contracts")
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        let by_cell = raw
            .into_iter()
            .map(|(cell, table)| serde_json::from_value(table).map(|t| (cell, t)))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            warehouse,
            contracts,
            by_cell,
        })
    }
}

// ---------------------------------------------------------------------------
// Capital and reputation
// ---------------------------------------------------------------------------

/// `capital.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capital {
    /// Starting balance of a new company.
    pub start: i64,
    /// Credit, deposit and tax policy.
    pub bank: BankPolicy,
}

/// Prison rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrisonRules {
    /// A company whose reputation drops to this value or below is jailed.
    pub on_reputation: u32,
    /// Turns spent in prison.
    pub stages: u32,
    /// Move to a random free cell on release.
    #[serde(default)]
    pub new_cell: bool,
}

/// Contract reputation deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractReputation {
    /// Gain for a fully delivered contract.
    #[serde(alias = "completed")]
    pub gained: u32,
    /// Loss for each missed delivery.
    #[serde(alias = "failed")]
    pub lost: u32,
}

/// Tax reputation deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxReputation {
    /// Gain for clearing the debt.
    pub paid: u32,
    /// Loss for each turn with debt.
    pub late: u32,
    /// Turns of debt tolerated before prison.
    pub not_paid_stages: u32,
}

/// Credit reputation deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditReputation {
    /// Gain for repaying a credit.
    pub gained: u32,
    /// Loss for each overdue turn.
    pub lost: u32,
    /// Overdue turns tolerated before prison.
    pub max_overdue: u32,
}

/// `reputation.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reputation {
    /// Starting reputation.
    pub start: u32,
    /// Prison.
    pub prison: PrisonRules,
    /// Contracts.
    pub contract: ContractReputation,
    /// Taxes.
    pub tax: TaxReputation,
    /// Credits.
    pub credit: CreditReputation,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Improvement levels of a new company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartImprovements {
    /// Warehouse.
    pub warehouse: u32,
    /// Contract slots.
    pub contracts: u32,
    /// Station.
    pub station: u32,
    /// Factory block.
    pub factory: u32,
}

/// `settings.json`. Timings are minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Lobby waiting time.
    #[serde(default)]
    pub players_wait_minutes: u32,
    /// Companies per session.
    pub max_companies: u32,
    /// Side of the square map.
    pub map_side: u32,
    /// Time to pick cells.
    pub turn_cell_time_minutes: u32,
    /// Cells per company.
    #[serde(default = "default_cell_on_company")]
    pub cell_on_company: u32,
    /// Length of a Game stage.
    pub time_on_game_stage: u32,
    /// Length of a ChangeTurn stage.
    pub time_on_change_stage: u32,
    /// Members per company.
    pub max_players_in_company: u32,
    /// Improvement levels of a new company.
    pub start_improvements_level: StartImprovements,
    /// Concurrent credits per company.
    pub max_credits_per_company: u32,
    /// Initial factory tooling by cell type.
    #[serde(default)]
    pub start_complectation: BTreeMap<String, String>,
    /// Logistics speed factor.
    #[serde(default)]
    pub logistics_speed: u32,
    /// Last playable turn.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

const fn default_cell_on_company() -> u32 {
    1
}

const fn default_max_steps() -> u32 {
    15
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Scope of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventScope {
    /// Affects every company.
    #[default]
    GlobalEvent,
    /// Affects companies on one cell type.
    CellTypeEvent,
}

/// Whether an event helps or hurts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Helps.
    Positive,
    /// Hurts.
    Negative,
    /// Neither.
    #[default]
    Neutral,
}

/// Effect overlay of an event. Absent fields leave the base rule alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEffects {
    /// Extraction multiplier on the event's cell type.
    #[serde(default)]
    pub income_multiplier: Option<Decimal>,
    /// Price multipliers by resource.
    #[serde(default)]
    pub increase_price: BTreeMap<String, Decimal>,
    /// Demand multipliers by resource.
    #[serde(default)]
    pub increase_demand: BTreeMap<String, Decimal>,
    /// Factory progress multiplier.
    #[serde(default)]
    pub tasks_speed: Option<Decimal>,
    /// Station extraction multiplier.
    #[serde(default)]
    pub resource_extraction_speed: Option<Decimal>,
    /// Contract slots removed from every company.
    #[serde(default)]
    pub contracts_limit_decrease: Option<u32>,
    /// Logistics multiplier.
    #[serde(default)]
    pub cell_logistics: Option<Decimal>,
    /// Small-business tax multiplier.
    #[serde(default)]
    pub tax_rate_small: Option<Decimal>,
    /// Big-business tax multiplier.
    #[serde(default)]
    pub tax_rate_large: Option<Decimal>,
}

/// Inclusive duration range in turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDuration {
    /// Shortest.
    #[serde(default)]
    pub min: Option<u32>,
    /// Longest.
    #[serde(default)]
    pub max: Option<u32>,
}

impl EventDuration {
    /// `(min, max)` with missing bounds defaulting to one turn.
    pub fn bounds(self) -> (u32, u32) {
        let min = self.min.unwrap_or(1).max(1);
        let max = self.max.unwrap_or(min).max(min);
        (min, max)
    }
}

/// A random session event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Display text.
    #[serde(default)]
    pub description: String,
    /// Scope.
    #[serde(default, rename = "type")]
    pub scope: EventScope,
    /// Helps or hurts.
    #[serde(default)]
    pub category: EventCategory,
    /// Cell type for cell-scoped events.
    #[serde(default)]
    pub cell_type: Option<String>,
    /// Whether players may preview the event.
    #[serde(default)]
    pub predictability: bool,
    /// Effects.
    #[serde(default)]
    pub effects: EventEffects,
    /// Duration.
    #[serde(default)]
    pub duration: EventDuration,
}

/// `events.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsFile {
    /// Events by id.
    #[serde(default)]
    pub events: BTreeMap<String, GameEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_with_offsets() {
        let loc = Location::parse("center_-1_1");
        assert_eq!(
            loc,
            Some(Location {
                anchor: Anchor::Center,
                dx: -1,
                dy: 1
            })
        );
    }

    #[test]
    fn corner_spellings() {
        assert_eq!(Location::parse("top_left").map(|l| l.anchor), Some(Anchor::TopLeft));
        assert_eq!(Location::parse("left-top").map(|l| l.anchor), Some(Anchor::TopLeft));
        assert_eq!(
            Location::parse("bottom_right_0_-2").map(|l| (l.anchor, l.dy)),
            Some((Anchor::BottomRight, -2))
        );
        assert_eq!(Location::parse("nowhere"), None);
        assert_eq!(Location::parse("center_a_1"), None);
    }

    #[test]
    fn placements_respect_max_amount() {
        let cell = CellType {
            label: String::from("City"),
            resource_id: None,
            max_amount: 1,
            pickable: false,
            locations: vec![String::from("top_left"), String::from("bottom_right")],
        };
        assert_eq!(cell.placements().len(), 1);
    }

    #[test]
    fn duration_bounds_default_to_one_turn() {
        assert_eq!(EventDuration::default().bounds(), (1, 1));
        let d = EventDuration {
            min: Some(3),
            max: Some(2),
        };
        assert_eq!(d.bounds(), (3, 3));
    }

    #[test]
    fn improvements_flatten_cell_tables() {
        let json = serde_json::json!({
            "warehouse": {"1": {"cost": 0, "capacity": 100}},
            "contracts": {"1": {"cost": 0, "max": 2}},
            "forest": {
                "station": {"1": {"cost": 0, "productsPerTurn": 5}},
                "factory": {"1": {"cost": 0, "factories": 1}}
            }
        });
        let imp: Improvements = serde_json::from_value(json).unwrap_or_default();
        assert_eq!(imp.warehouse.get(&1).and_then(|l| l.capacity), Some(100));
        let forest = imp.by_cell.get("forest");
        assert_eq!(
            forest.and_then(|f| f.station.get(&1)).and_then(|l| l.products_per_turn),
            Some(5)
        );
    }
}
