//! Error types for the document store.

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the snapshot file failed.
    #[error("snapshot I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A document or snapshot could not be (de)serialized.
    #[error("serialization error: {source}")]
    Serialization {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// Only JSON objects can be stored.
    #[error("document for table {table} is not a JSON object")]
    NotAnObject {
        /// Target table.
        table: String,
    },

    /// Filters must be JSON objects (or null for "match everything").
    #[error("filter for table {table} must be an object")]
    InvalidFilter {
        /// Target table.
        table: String,
    },

    /// A thread panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,
}
