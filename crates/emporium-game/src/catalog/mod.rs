//! Immutable game catalog.
//!
//! Loaded once at boot from a directory of JSON files and shared as
//! `Arc<Catalog>`. Line comments (`// ...` outside string literals) are
//! stripped before parsing. Cross-file references are validated at load
//! time so game code can treat a missing entry as a catalog error rather
//! than a client error.

mod models;
mod sample;

use std::collections::BTreeMap;
use std::path::Path;

use emporium_types::ImprovementKind;
use tracing::info;

use crate::error::CatalogError;

pub use models::{
    Anchor, Capital, CellImprovements, CellType, ContractReputation, CreditReputation,
    EventCategory, EventDuration, EventEffects, EventScope, EventsFile, GameEvent,
    ImprovementLevel, Improvements, Levels, Location, PrisonRules, Production, Reputation,
    Resource, Settings, StartImprovements, TaxReputation,
};

/// Raw JSON text of every catalog file.
#[derive(Debug, Clone, Copy)]
pub struct CatalogSources<'a> {
    /// `resources.json`.
    pub resources: &'a str,
    /// `cells.json`.
    pub cells: &'a str,
    /// `improvements.json`.
    pub improvements: &'a str,
    /// `capital.json`.
    pub capital: &'a str,
    /// `reputation.json`.
    pub reputation: &'a str,
    /// `settings.json`.
    pub settings: &'a str,
    /// `events.json`.
    pub events: &'a str,
}

/// All static game data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Resources by id.
    pub resources: BTreeMap<String, Resource>,
    /// Cell types by id.
    pub cells: BTreeMap<String, CellType>,
    /// Improvement tables.
    pub improvements: Improvements,
    /// Starting capital and bank policy.
    pub capital: Capital,
    /// Reputation rules.
    pub reputation: Reputation,
    /// Session settings.
    pub settings: Settings,
    /// Random events by id.
    pub events: BTreeMap<String, GameEvent>,
}

/// Remove `//` comments that are not inside a string literal.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let mut in_string = false;
        let mut escaped = false;
        let mut prev_slash = false;
        let mut cut = None;
        for (i, ch) in line.char_indices() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    in_string = false;
                }
                continue;
            }
            match ch {
                '"' => {
                    in_string = true;
                    prev_slash = false;
                }
                '/' if prev_slash => {
                    cut = i.checked_sub(1);
                    break;
                }
                '/' => prev_slash = true,
                _ => prev_slash = false,
            }
        }
        match cut.and_then(|end| line.get(..end)) {
            Some(code) => out.push_str(code),
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}

fn parse<T: serde::de::DeserializeOwned>(file: &'static str, text: &str) -> Result<T, CatalogError> {
    serde_json::from_str(&strip_comments(text)).map_err(|source| CatalogError::Parse { file, source })
}

fn invalid(reason: impl Into<String>) -> CatalogError {
    CatalogError::Invalid {
        reason: reason.into(),
    }
}

impl Catalog {
    /// Parse and validate a catalog from file contents.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] for malformed files and
    /// [`CatalogError::Invalid`] for dangling references.
    pub fn from_sources(src: &CatalogSources<'_>) -> Result<Self, CatalogError> {
        let events: EventsFile = parse("events.json", src.events)?;
        let catalog = Self {
            resources: parse("resources.json", src.resources)?,
            cells: parse("cells.json", src.cells)?,
            improvements: parse("improvements.json", src.improvements)?,
            capital: parse("capital.json", src.capital)?,
            reputation: parse("reputation.json", src.reputation)?,
            settings: parse("settings.json", src.settings)?,
            events: events.events,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load every catalog file from `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] if a file is missing, otherwise as
    /// [`Catalog::from_sources`].
    pub fn load_dir(dir: &Path) -> Result<Self, CatalogError> {
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read_to_string(&path).map_err(|source| CatalogError::Io { path, source })
        };
        let resources = read("resources.json")?;
        let cells = read("cells.json")?;
        let improvements = read("improvements.json")?;
        let capital = read("capital.json")?;
        let reputation = read("reputation.json")?;
        let settings = read("settings.json")?;
        let events = read("events.json")?;

        let catalog = Self::from_sources(&CatalogSources {
            resources: &resources,
            cells: &cells,
            improvements: &improvements,
            capital: &capital,
            reputation: &reputation,
            settings: &settings,
            events: &events,
        })?;
        info!(
            dir = %dir.display(),
            resources = catalog.resources.len(),
            cells = catalog.cells.len(),
            events = catalog.events.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        for (id, cell) in &self.cells {
            if let Some(res) = &cell.resource_id {
                if !self.resources.contains_key(res) {
                    return Err(invalid(format!("cell {id} extracts unknown resource {res}")));
                }
            }
        }
        for (id, res) in &self.resources {
            if let Some(production) = &res.production {
                if production.turns == 0 {
                    return Err(invalid(format!("resource {id} has a zero-turn recipe")));
                }
                if let Some(missing) = production
                    .materials
                    .keys()
                    .find(|m| !self.resources.contains_key(*m))
                {
                    return Err(invalid(format!("resource {id} needs unknown material {missing}")));
                }
            }
        }
        for (cell, product) in &self.settings.start_complectation {
            if !self.cells.contains_key(cell) {
                return Err(invalid(format!("start complectation for unknown cell {cell}")));
            }
            if !self.resources.contains_key(product) {
                return Err(invalid(format!("start complectation {product} is not a resource")));
            }
        }
        for cell in self.improvements.by_cell.keys() {
            if !self.cells.contains_key(cell) {
                return Err(invalid(format!("improvements for unknown cell {cell}")));
            }
        }
        let start = self.settings.start_improvements_level;
        if !self.improvements.warehouse.contains_key(&start.warehouse) {
            return Err(invalid("start warehouse level is not defined"));
        }
        if !self.improvements.contracts.contains_key(&start.contracts) {
            return Err(invalid("start contracts level is not defined"));
        }
        if self.settings.map_side == 0 {
            return Err(invalid("map_side must be positive"));
        }
        for (id, event) in &self.events {
            if let Some(cell) = &event.cell_type {
                if !self.cells.contains_key(cell) {
                    return Err(invalid(format!("event {id} targets unknown cell {cell}")));
                }
            }
        }
        Ok(())
    }

    /// Resource by id.
    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// Cell type by id.
    pub fn cell(&self, id: &str) -> Option<&CellType> {
        self.cells.get(id)
    }

    /// Ids of cell types a company may settle on.
    pub fn pickable_cells(&self) -> Vec<&str> {
        self.cells
            .iter()
            .filter(|(_, c)| c.pickable)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Level table of `kind`; station and factory resolve through the
    /// company's cell type.
    pub fn levels(&self, kind: ImprovementKind, cell_type: Option<&str>) -> Option<&Levels> {
        match kind {
            ImprovementKind::Warehouse => Some(&self.improvements.warehouse),
            ImprovementKind::Contracts => Some(&self.improvements.contracts),
            ImprovementKind::Station => self
                .improvements
                .by_cell
                .get(cell_type?)
                .map(|t| &t.station),
            ImprovementKind::Factory => self
                .improvements
                .by_cell
                .get(cell_type?)
                .map(|t| &t.factory),
        }
    }

    /// One level of `kind`.
    pub fn level(
        &self,
        kind: ImprovementKind,
        cell_type: Option<&str>,
        level: u32,
    ) -> Option<&ImprovementLevel> {
        self.levels(kind, cell_type)?.get(&level)
    }

    /// Warehouse capacity at `level` (0 when undefined).
    pub fn warehouse_capacity(&self, level: u32) -> u32 {
        self.improvements
            .warehouse
            .get(&level)
            .and_then(|l| l.capacity)
            .unwrap_or(0)
    }

    /// Contract slots at `level` (0 when undefined).
    pub fn contracts_limit(&self, level: u32) -> u32 {
        self.improvements
            .contracts
            .get(&level)
            .and_then(|l| l.max)
            .unwrap_or(0)
    }

    /// Reference price of `resource` (0 when unknown).
    pub fn base_price(&self, resource: &str) -> i64 {
        self.resources.get(resource).map_or(0, |r| r.base_price)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::indexing_slicing)]

    use super::*;

    #[test]
    fn comments_outside_strings_are_removed() {
        let text = "{\n  \"url\": \"http://x\", // trailing\n  // whole line\n  \"a\": 1\n}";
        let stripped = strip_comments(text);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["url"], "http://x");
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn sample_catalog_validates() {
        let catalog = Catalog::sample().unwrap();
        assert!(catalog.validate().is_ok());
        assert!(catalog.pickable_cells().contains(&"forest"));
        assert_eq!(catalog.warehouse_capacity(1), 100);
        assert_eq!(
            catalog
                .level(ImprovementKind::Station, Some("forest"), 1)
                .and_then(|l| l.products_per_turn),
            Some(5)
        );
        assert!(catalog.levels(ImprovementKind::Station, None).is_none());
    }

    #[test]
    fn dangling_cell_resource_is_rejected() {
        let mut sources = sample::SOURCES;
        sources.cells = r#"{"swamp": {"label": "Swamp", "resource": "peat", "pickable": true}}"#;
        let err = Catalog::from_sources(&sources).unwrap_err();
        assert!(matches!(err, CatalogError::Invalid { .. }));
    }

    #[test]
    fn malformed_file_names_the_file() {
        let mut sources = sample::SOURCES;
        sources.settings = "{ not json";
        let err = Catalog::from_sources(&sources).unwrap_err();
        assert!(err.to_string().contains("settings.json"));
    }

    #[test]
    fn missing_directory_is_io_error() {
        let err = Catalog::load_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
