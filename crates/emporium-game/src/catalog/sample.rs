//! Compact built-in catalog for tests and local runs.

use super::{Catalog, CatalogSources};
use crate::error::CatalogError;

pub(super) const SOURCES: CatalogSources<'static> = CatalogSources {
    resources: r#"{
        "wood":   {"label": "Wood",   "emoji": "🪵", "basePrice": 10, "massModifier": 1.0, "raw": true, "level": 1},
        "stone":  {"label": "Stone",  "emoji": "🪨", "basePrice": 12, "massModifier": 1.5, "raw": true, "level": 1},
        "planks": {"label": "Planks", "emoji": "🪚", "basePrice": 30, "massModifier": 1.0, "level": 1,
                   "production": {"materials": {"wood": 2}, "turns": 1, "output": 1}},
        "bricks": {"label": "Bricks", "emoji": "🧱", "basePrice": 35, "massModifier": 2.0, "level": 1,
                   "production": {"materials": {"stone": 2}, "turns": 1, "output": 1}},
        "nails":  {"label": "Nails",  "emoji": "🔩", "basePrice": 40, "massModifier": 0.5, "level": 2,
                   "production": {"materials": {"wood": 2}, "turns": 2, "output": 3}}
    }"#,
    cells: r#"{
        "forest":   {"label": "Forest",   "resource": "wood",  "pickable": true},
        "mountain": {"label": "Mountain", "resource": "stone", "pickable": true},
        "bank":     {"label": "Bank", "max_amount": 1, "locations": ["center"]}
    }"#,
    improvements: r#"{
        "warehouse": {
            "1": {"cost": 0,    "capacity": 100},
            "2": {"cost": 500,  "capacity": 250},
            "3": {"cost": 1500, "capacity": 600}
        },
        "contracts": {
            "1": {"cost": 0,   "max": 2},
            "2": {"cost": 400, "max": 4}
        },
        "forest": {
            "station": {"1": {"cost": 0, "productsPerTurn": 5}, "2": {"cost": 800, "productsPerTurn": 9}},
            "factory": {"1": {"cost": 0, "tasksPerTurn": 1, "factories": 1}, "2": {"cost": 1000, "tasksPerTurn": 2, "factories": 3}}
        },
        "mountain": {
            "station": {"1": {"cost": 0, "productsPerTurn": 4}, "2": {"cost": 800, "productsPerTurn": 8}},
            "factory": {"1": {"cost": 0, "tasksPerTurn": 1, "factories": 1}, "2": {"cost": 1000, "tasksPerTurn": 2, "factories": 3}}
        }
    }"#,
    capital: r#"{
        "start": 5000,
        "bank": {
            "credit": {
                "min": 500, "max": 50000,
                "conditions": [
                    {"on_reputation": {"min": 0,  "max": 19},   "possible": false},
                    {"on_reputation": {"min": 20, "max": 1000}, "possible": true, "without_interest": 2, "percent": 5}
                ]
            },
            "contribution": {
                "min": 500, "max": 50000,
                "conditions": [
                    {"on_reputation": {"min": 0,  "max": 9},    "possible": false},
                    {"on_reputation": {"min": 10, "max": 1000}, "possible": true, "percent": 3}
                ]
            },
            "tax": {"auto_pay": false, "small_business": 0.1, "big_business": 0.2, "big_on": 5000}
        }
    }"#,
    reputation: r#"{
        "start": 100,
        "prison": {"on_reputation": 0, "stages": 2, "new_cell": false},
        "contract": {"completed": 5, "failed": 10},
        "tax": {"paid": 2, "late": 5, "not_paid_stages": 3},
        "credit": {"gained": 10, "lost": 5, "max_overdue": 2}
    }"#,
    settings: r#"{
        // minutes unless noted
        "players_wait_minutes": 5,
        "max_companies": 10,
        "map_side": 7,
        "turn_cell_time_minutes": 3,
        "cell_on_company": 1,
        "time_on_game_stage": 5,
        "time_on_change_stage": 1,
        "max_players_in_company": 3,
        "start_improvements_level": {"warehouse": 1, "contracts": 1, "station": 1, "factory": 1},
        "max_credits_per_company": 2,
        "start_complectation": {"forest": "planks", "mountain": "bricks"},
        "logistics_speed": 10,
        "max_steps": 15
    }"#,
    events: r#"{
        "events": {
            "good_harvest": {
                "name": "Good harvest", "description": "Forests yield more",
                "type": "cell_type_event", "category": "positive", "cell_type": "forest",
                "effects": {"income_multiplier": 1.5},
                "duration": {"min": 1, "max": 2}
            },
            "tax_reform": {
                "name": "Tax reform", "description": "Rates go up",
                "type": "global_event", "category": "negative",
                "effects": {"tax_rate_small": 1.5, "tax_rate_large": 1.5},
                "duration": {"min": 2, "max": 3}
            },
            "strike": {
                "name": "Strike", "description": "Stations and contracts slow down",
                "type": "global_event", "category": "negative",
                "effects": {"resource_extraction_speed": 0.5, "contracts_limit_decrease": 1},
                "duration": {"min": 1, "max": 1}
            }
        }
    }"#,
};

impl Catalog {
    /// The built-in sample catalog: a 7x7 map of forest and mountain with
    /// a bank in the center.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if the embedded sources stop validating.
    pub fn sample() -> Result<Self, CatalogError> {
        Self::from_sources(&SOURCES)
    }
}
