//! Document store - keyed collections of schemaless JSON records.
//!
//! Two stores with identical mechanics back every server: the general
//! `storage` exposed through the `data` service, and the protected store
//! holding `users` and `sessions`, which only the auth layer and relation
//! loading reach into.
//!
//! ## Example
//!
//! ```ignore
//! use sups_rust::store::{DocumentStore, InMemoryStore};
//! use serde_json::json;
//!
//! let store = InMemoryStore::new();
//! let created = store.add("recipes", json!({ "title": "Soup" }).as_object().unwrap())?;
//! let loaded = store.get("recipes", created["_id"].as_str().unwrap())?;
//! ```

mod in_memory;
mod record;

use serde_json::{Map, Value};
use thiserror::Error;

pub use in_memory::InMemoryStore;
pub use record::{
    assign_clean, assign_system, loose_eq, now_millis, with_id, SYSTEM_FIELDS,
};

/// A stored document: ordered field map. `_id` is never part of the stored map.
pub type Record = Map<String, Value>;

/// Seed layout: collection name -> record id -> record.
pub type SeedData = Map<String, Value>;

/// Low-level store failures.
///
/// The not-found variants render with "does not exist" in their message, which
/// is what the CRUD service keys on when reclassifying failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Collection does not exist: {0}")]
    CollectionNotFound(String),
    #[error("Entry does not exist: {0}")]
    EntryNotFound(String),
    #[error("store lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

/// Generic CRUD over named collections.
///
/// Every returned record is an owned copy with `_id` attached; callers never
/// alias stored state.
pub trait DocumentStore: Send + Sync {
    /// Names of all collections, in creation order.
    fn collection_names(&self) -> Result<Vec<String>, StoreError>;

    /// All records of a collection, in insertion order.
    fn get_all(&self, collection: &str) -> Result<Vec<Record>, StoreError>;

    /// A single record.
    fn get(&self, collection: &str, id: &str) -> Result<Record, StoreError>;

    /// Insert a record under a fresh id, creating the collection if needed.
    fn add(&self, collection: &str, data: &Record) -> Result<Record, StoreError>;

    /// Replace a record, keeping its system fields.
    fn set(&self, collection: &str, id: &str, data: &Record) -> Result<Record, StoreError>;

    /// Shallow-merge non-system fields into a record.
    fn merge(&self, collection: &str, id: &str, data: &Record) -> Result<Record, StoreError>;

    /// Remove a record, returning `{ "_deletedOn": <millis> }`.
    fn delete(&self, collection: &str, id: &str) -> Result<Record, StoreError>;

    /// Records whose fields loosely equal every pair in `query`.
    ///
    /// Strings compare case-insensitively.
    fn query(&self, collection: &str, query: &Record) -> Result<Vec<Record>, StoreError>;
}
