//! In-memory table with an inverted equality index.
//!
//! Every scalar top-level field (string, number, bool, null) of every row
//! is indexed as `field -> encoded value -> {row offsets}`. Predicates on
//! scalar values resolve through the index; predicates on arrays or
//! objects fall back to comparing the candidate rows directly.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::{Map, Value};

/// A stored document.
pub(crate) type Row = Map<String, Value>;

/// One table: rows in insertion order plus the inverted index.
#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    rows: Vec<Row>,
    index: BTreeMap<String, HashMap<String, BTreeSet<usize>>>,
}

/// Index key of a value, or `None` when the value is not indexable.
fn index_key(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            Some(value.to_string())
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Whether `row` satisfies every predicate in `filter`.
fn row_matches(row: &Row, filter: &Row) -> bool {
    filter
        .iter()
        .all(|(field, expected)| row.get(field).is_some_and(|actual| actual == expected))
}

impl Table {
    /// Build a table from persisted rows.
    pub(crate) fn from_rows(rows: Vec<Row>) -> Self {
        let mut table = Self {
            rows,
            index: BTreeMap::new(),
        };
        table.reindex();
        table
    }

    /// All rows in insertion order.
    pub(crate) fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Largest integer `id` in the table (0 when empty).
    pub(crate) fn max_id(&self) -> u64 {
        self.rows
            .iter()
            .filter_map(|row| row.get("id").and_then(Value::as_u64))
            .max()
            .unwrap_or(0)
    }

    /// Append a row and index it.
    pub(crate) fn push(&mut self, row: Row) {
        let offset = self.rows.len();
        self.rows.push(row);
        self.index_row(offset);
    }

    /// Offsets of rows matching `filter`, ascending.
    pub(crate) fn matching(&self, filter: &Row) -> Vec<usize> {
        let mut candidates: Option<BTreeSet<usize>> = None;
        let mut unindexed = Map::new();

        for (field, expected) in filter {
            let Some(key) = index_key(expected) else {
                unindexed.insert(field.clone(), expected.clone());
                continue;
            };
            let hits = self
                .index
                .get(field)
                .and_then(|values| values.get(&key))
                .cloned()
                .unwrap_or_default();
            candidates = Some(match candidates {
                None => hits,
                Some(current) => current.intersection(&hits).copied().collect(),
            });
        }

        match candidates {
            Some(set) => set
                .into_iter()
                .filter(|offset| {
                    self.rows
                        .get(*offset)
                        .is_some_and(|row| row_matches(row, &unindexed))
                })
                .collect(),
            // No indexable predicate: linear scan.
            None => self
                .rows
                .iter()
                .enumerate()
                .filter(|(_, row)| row_matches(row, &unindexed))
                .map(|(offset, _)| offset)
                .collect(),
        }
    }

    /// Borrow the row at `offset`.
    pub(crate) fn get(&self, offset: usize) -> Option<&Row> {
        self.rows.get(offset)
    }

    /// Merge `patch` into the row at `offset`, keeping the index current.
    pub(crate) fn patch(&mut self, offset: usize, patch: &Row) {
        self.unindex_row(offset);
        if let Some(row) = self.rows.get_mut(offset) {
            for (field, value) in patch {
                row.insert(field.clone(), value.clone());
            }
        }
        self.index_row(offset);
    }

    /// Remove the rows at `offsets`. Offsets shift, so the index is rebuilt.
    pub(crate) fn remove(&mut self, offsets: &BTreeSet<usize>) {
        let mut offset = 0_usize;
        self.rows.retain(|_| {
            let keep = !offsets.contains(&offset);
            offset = offset.saturating_add(1);
            keep
        });
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index.clear();
        for offset in 0..self.rows.len() {
            self.index_row(offset);
        }
    }

    fn index_row(&mut self, offset: usize) {
        let Some(row) = self.rows.get(offset) else {
            return;
        };
        for (field, value) in row {
            if let Some(key) = index_key(value) {
                self.index
                    .entry(field.clone())
                    .or_default()
                    .entry(key)
                    .or_default()
                    .insert(offset);
            }
        }
    }

    fn unindex_row(&mut self, offset: usize) {
        let Some(row) = self.rows.get(offset) else {
            return;
        };
        for (field, value) in row {
            let Some(key) = index_key(value) else {
                continue;
            };
            if let Some(values) = self.index.get_mut(field) {
                if let Some(set) = values.get_mut(&key) {
                    set.remove(&offset);
                    if set.is_empty() {
                        values.remove(&key);
                    }
                }
            }
        }
    }
}
