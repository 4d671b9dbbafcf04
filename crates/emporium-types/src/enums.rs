//! Enumeration types for the Emporium game.
//!
//! Wire representations match the strings clients already send and
//! receive (`"FreeUserConnect"`, `"small"`, `"barter"`, ...), so every enum
//! carries an explicit serde rename policy.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// Coarse phase of a session.
///
/// ```text
/// WaitWebConnect -> FreeUserConnect -> CellSelect -> Game <-> ChangeTurn -> End
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SessionStage {
    /// Waiting for the operator front-end to attach.
    WaitWebConnect,
    /// Lobby: users and companies may be created.
    FreeUserConnect,
    /// Companies pick their map cells.
    CellSelect,
    /// A playable turn is in progress.
    Game,
    /// Changeover between two turns.
    ChangeTurn,
    /// Terminal stage; all company mutations are frozen.
    End,
}

impl SessionStage {
    /// Stable wire name of the stage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WaitWebConnect => "WaitWebConnect",
            Self::FreeUserConnect => "FreeUserConnect",
            Self::CellSelect => "CellSelect",
            Self::Game => "Game",
            Self::ChangeTurn => "ChangeTurn",
            Self::End => "End",
        }
    }

    /// Whether a stage-advancement timer must exist while in this stage.
    pub const fn is_timed(self) -> bool {
        matches!(self, Self::CellSelect | Self::Game | Self::ChangeTurn)
    }
}

impl core::fmt::Display for SessionStage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Company
// ---------------------------------------------------------------------------

/// Tax bracket of a company, decided from the previous turn's income.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessType {
    /// Income below the `big_on` threshold.
    #[default]
    Small,
    /// Income at or above the `big_on` threshold.
    Big,
}

/// Upgradeable company improvement.
///
/// `Station` and `Factory` resolve against the improvement table of the
/// company's current cell type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementKind {
    /// Warehouse capacity.
    Warehouse,
    /// Maximum number of concurrent contracts.
    Contracts,
    /// Raw extraction per turn on the company's cell.
    Station,
    /// Number of factories.
    Factory,
}

impl ImprovementKind {
    /// All kinds, in the order start levels are assigned.
    pub const ALL: [Self; 4] = [Self::Warehouse, Self::Contracts, Self::Station, Self::Factory];

    /// Key under which the level is stored in `Company::improvements`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warehouse => "warehouse",
            Self::Contracts => "contracts",
            Self::Station => "station",
            Self::Factory => "factory",
        }
    }
}

// ---------------------------------------------------------------------------
// Exchange
// ---------------------------------------------------------------------------

/// How the buyer pays for an exchange offer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealType {
    /// Buyer pays `price_money`.
    #[default]
    Money,
    /// Buyer pays `barter_amount` of `barter_resource`.
    Barter,
}

/// Lifecycle status of an exchange offer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    /// Listed; accepts purchase requests.
    #[default]
    Active,
    /// A buyer was accepted; waiting for the seller to ship.
    Pending,
    /// Goods and payment changed hands.
    Completed,
    /// Cancelled by the seller.
    Rejected,
    /// Seller missed the delivery deadline.
    Failed,
}

impl ExchangeStatus {
    /// Whether no further transitions are possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_wire_names_are_pascal_case() {
        let json = serde_json::to_string(&SessionStage::ChangeTurn).unwrap_or_default();
        assert_eq!(json, "\"ChangeTurn\"");
        assert_eq!(SessionStage::FreeUserConnect.to_string(), "FreeUserConnect");
    }

    #[test]
    fn only_play_stages_are_timed() {
        assert!(SessionStage::Game.is_timed());
        assert!(SessionStage::ChangeTurn.is_timed());
        assert!(!SessionStage::FreeUserConnect.is_timed());
        assert!(!SessionStage::End.is_timed());
    }

    #[test]
    fn snake_case_enums() {
        assert_eq!(serde_json::to_string(&BusinessType::Big).unwrap_or_default(), "\"big\"");
        assert_eq!(serde_json::to_string(&DealType::Barter).unwrap_or_default(), "\"barter\"");
        let status: ExchangeStatus = serde_json::from_str("\"pending\"").unwrap_or_default();
        assert_eq!(status, ExchangeStatus::Pending);
        assert!(ExchangeStatus::Failed.is_terminal());
        assert!(!ExchangeStatus::Pending.is_terminal());
    }
}
