//! Typed access to the store through the [`Document`] trait.
//!
//! Records are validated at the store boundary: a stored document that no
//! longer decodes into its record type surfaces as
//! [`StoreError::Serialization`] instead of a partially-filled struct.

use emporium_types::Document;
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::store::DocumentStore;

fn key_filter<D: Document>(key: Value) -> Value {
    let mut filter = Map::new();
    filter.insert(String::from(D::KEY), key);
    Value::Object(filter)
}

impl DocumentStore {
    /// Fetch the record whose key field equals `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the stored document does
    /// not decode into `D`.
    pub fn get<D: Document>(&self, key: impl Into<Value>) -> Result<Option<D>, StoreError> {
        self.find_one(D::TABLE, &key_filter::<D>(key.into()))?
            .map(serde_json::from_value)
            .transpose()
            .map_err(StoreError::from)
    }

    /// All records matching `filter`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns a filter or decoding error.
    pub fn find_typed<D: Document>(&self, filter: &Value) -> Result<Vec<D>, StoreError> {
        self.find(D::TABLE, filter)?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
            .collect()
    }

    /// First record matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns a filter or decoding error.
    pub fn find_one_typed<D: Document>(&self, filter: &Value) -> Result<Option<D>, StoreError> {
        self.find_one(D::TABLE, filter)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(StoreError::from)
    }

    /// Insert or replace the record identified by its key.
    ///
    /// # Errors
    ///
    /// Returns an encoding or persistence error.
    pub fn save<D: Document>(&self, doc: &D) -> Result<(), StoreError> {
        let value = serde_json::to_value(doc)?;
        let filter = key_filter::<D>(doc.key());
        if self.count(D::TABLE, &filter)? > 0 {
            self.update(D::TABLE, &filter, &value)?;
        } else {
            self.insert(D::TABLE, value)?;
        }
        Ok(())
    }

    /// Delete the record identified by its key. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns a persistence error.
    pub fn remove<D: Document>(&self, doc: &D) -> Result<bool, StoreError> {
        Ok(self.delete(D::TABLE, &key_filter::<D>(doc.key()))? > 0)
    }
}
