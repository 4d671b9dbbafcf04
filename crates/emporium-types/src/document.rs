//! The contract between typed entities and the document store.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A record stored as one JSON document in a named table.
///
/// `KEY` names the field that identifies the record; `key()` returns its
/// value. The store uses the pair for upserts and typed lookups.
pub trait Document: Serialize + DeserializeOwned {
    /// Table the record lives in.
    const TABLE: &'static str;
    /// Name of the identifying field.
    const KEY: &'static str;

    /// Value of the identifying field.
    fn key(&self) -> Value;
}
