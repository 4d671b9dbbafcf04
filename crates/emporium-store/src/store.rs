//! The document store.
//!
//! A process-wide [`DocumentStore`] holds every table behind one mutex.
//! Reads return owned copies, so callers never alias stored data. Writes
//! apply in memory, then persist a full snapshot; if persisting fails the
//! table is rolled back and the error surfaces to the caller.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::snapshot;
use crate::table::{Row, Table};

/// Thread-safe indexed key-value store of JSON documents.
#[derive(Debug)]
pub struct DocumentStore {
    path: Option<PathBuf>,
    tables: Mutex<BTreeMap<String, Table>>,
}

fn as_filter(table: &str, filter: &Value) -> Result<Row, StoreError> {
    match filter {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map.clone()),
        _ => Err(StoreError::InvalidFilter {
            table: table.to_owned(),
        }),
    }
}

fn now_stamp() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

impl DocumentStore {
    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            tables: Mutex::new(BTreeMap::new()),
        }
    }

    /// Open (or create) a store backed by the snapshot file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] or [`StoreError::Serialization`] if an
    /// existing snapshot cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let snapshot = snapshot::load(&path)?;
        let tables: BTreeMap<String, Table> = snapshot
            .into_iter()
            .map(|(name, rows)| (name, Table::from_rows(rows)))
            .collect();
        info!(
            path = %path.display(),
            tables = tables.len(),
            "document store opened"
        );
        Ok(Self {
            path: Some(path),
            tables: Mutex::new(tables),
        })
    }

    /// Snapshot file, if persistent.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Table>>, StoreError> {
        self.tables.lock().map_err(|_poisoned| StoreError::Poisoned)
    }

    fn persist(&self, tables: &BTreeMap<String, Table>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let view: BTreeMap<&str, &[Row]> = tables
            .iter()
            .map(|(name, table)| (name.as_str(), table.rows()))
            .collect();
        let bytes = serde_json::to_vec(&view)?;
        snapshot::write(path, &bytes)?;
        debug!(bytes = bytes.len(), "snapshot written");
        Ok(())
    }

    /// Run a write against one table, persisting afterwards and rolling
    /// the table back if either step fails.
    fn mutate<T>(
        &self,
        table: &str,
        op: impl FnOnce(&mut Table) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self.lock()?;
        let previous = tables.get(table).cloned();

        let result = op(tables.entry(table.to_owned()).or_default());
        let result = result.and_then(|out| self.persist(&tables).map(|()| out));

        if result.is_err() {
            warn!(table, "write failed, rolling table back");
            match previous {
                Some(prev) => {
                    tables.insert(table.to_owned(), prev);
                }
                None => {
                    tables.remove(table);
                }
            }
        }
        result
    }

    /// Insert a document, assigning `id = max_id + 1` when absent and
    /// stamping `created_at` / `updated_at`. Returns the document id (0 for
    /// caller-supplied ids that are not unsigned integers).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotAnObject`] for non-object documents, or
    /// a persistence error.
    pub fn insert(&self, table: &str, doc: Value) -> Result<u64, StoreError> {
        let Value::Object(mut row) = doc else {
            return Err(StoreError::NotAnObject {
                table: table.to_owned(),
            });
        };
        self.mutate(table, |t| {
            let id = match row.get("id").filter(|v| !v.is_null()) {
                Some(id) => id.as_u64().unwrap_or(0),
                None => {
                    let id = t.max_id().saturating_add(1);
                    row.insert(String::from("id"), Value::from(id));
                    id
                }
            };
            let stamp = now_stamp();
            row.entry(String::from("created_at"))
                .or_insert_with(|| stamp.clone());
            row.insert(String::from("updated_at"), stamp);
            t.push(row);
            Ok(id)
        })
    }

    /// Merge `patch` into every document matching `filter`. Returns the
    /// number of documents updated.
    ///
    /// # Errors
    ///
    /// Returns an error for non-object filters or patches, or a
    /// persistence error.
    pub fn update(&self, table: &str, filter: &Value, patch: &Value) -> Result<usize, StoreError> {
        let filter = as_filter(table, filter)?;
        let Value::Object(patch) = patch else {
            return Err(StoreError::NotAnObject {
                table: table.to_owned(),
            });
        };
        let mut patch = patch.clone();
        patch.insert(String::from("updated_at"), now_stamp());

        self.mutate(table, |t| {
            let offsets = t.matching(&filter);
            for offset in &offsets {
                t.patch(*offset, &patch);
            }
            Ok(offsets.len())
        })
    }

    /// All documents matching every field of `filter` (null matches all).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFilter`] for non-object filters.
    pub fn find(&self, table: &str, filter: &Value) -> Result<Vec<Value>, StoreError> {
        let filter = as_filter(table, filter)?;
        let tables = self.lock()?;
        let Some(t) = tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(t.matching(&filter)
            .into_iter()
            .filter_map(|offset| t.get(offset).cloned().map(Value::Object))
            .collect())
    }

    /// First document matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFilter`] for non-object filters.
    pub fn find_one(&self, table: &str, filter: &Value) -> Result<Option<Value>, StoreError> {
        let filter = as_filter(table, filter)?;
        let tables = self.lock()?;
        let Some(t) = tables.get(table) else {
            return Ok(None);
        };
        Ok(t.matching(&filter)
            .first()
            .and_then(|offset| t.get(*offset).cloned())
            .map(Value::Object))
    }

    /// Number of documents matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFilter`] for non-object filters.
    pub fn count(&self, table: &str, filter: &Value) -> Result<usize, StoreError> {
        let filter = as_filter(table, filter)?;
        let tables = self.lock()?;
        Ok(tables.get(table).map_or(0, |t| t.matching(&filter).len()))
    }

    /// Delete documents matching `filter`. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFilter`] or a persistence error.
    pub fn delete(&self, table: &str, filter: &Value) -> Result<usize, StoreError> {
        let filter = as_filter(table, filter)?;
        self.mutate(table, |t| {
            let offsets: BTreeSet<usize> = t.matching(&filter).into_iter().collect();
            if !offsets.is_empty() {
                t.remove(&offsets);
            }
            Ok(offsets.len())
        })
    }

    /// Largest integer `id` in `table` (0 when empty or missing).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the lock is poisoned.
    pub fn max_id(&self, table: &str) -> Result<u64, StoreError> {
        let tables = self.lock()?;
        Ok(tables.get(table).map_or(0, Table::max_id))
    }

    /// Id the next inserted document of `table` would receive.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the lock is poisoned.
    pub fn next_id(&self, table: &str) -> Result<u64, StoreError> {
        Ok(self.max_id(table)?.saturating_add(1))
    }

    /// Names of all tables.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the lock is poisoned.
    pub fn tables(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}
