//! Indexed JSON document store for the Emporium game server.
//!
//! Tables are lists of JSON objects. Each document gets a monotonically
//! assigned integer `id` and `created_at` / `updated_at` stamps. Equality
//! lookups go through a per-table inverted index; predicates on nested
//! values fall back to a scan.
//!
//! Persistent stores write a full snapshot after every mutation using a
//! temp-file-then-rename protocol with a single backup slot (see
//! [`snapshot`]). In-memory stores skip persistence and are used by tests.
//!
//! # Modules
//!
//! - [`store`] -- [`DocumentStore`] and its untyped operations
//! - [`typed`] -- `get` / `save` / `find_typed` over [`emporium_types::Document`]
//! - [`snapshot`] -- Snapshot file protocol
//! - [`error`] -- [`StoreError`]

pub mod error;
pub mod snapshot;
pub mod store;
mod table;
pub mod typed;

pub use error::StoreError;
pub use store::DocumentStore;
