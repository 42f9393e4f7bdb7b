//! InMemoryStore - HashMap-backed document store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use super::record::{assign_clean, assign_system, loose_eq, now_millis, with_id};
use super::{DocumentStore, Record, SeedData, StoreError};

/// Records of one collection, remembering insertion order.
#[derive(Default)]
struct Collection {
    order: Vec<String>,
    entries: HashMap<String, Record>,
}

impl Collection {
    fn insert(&mut self, id: String, record: Record) {
        if self.entries.insert(id.clone(), record).is_none() {
            self.order.push(id);
        }
    }

    fn remove(&mut self, id: &str) -> Option<Record> {
        let removed = self.entries.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    fn iter(&self) -> impl Iterator<Item = (&String, &Record)> {
        self.order
            .iter()
            .filter_map(move |id| self.entries.get(id).map(|record| (id, record)))
    }
}

#[derive(Default)]
struct Collections {
    order: Vec<String>,
    by_name: HashMap<String, Collection>,
}

impl Collections {
    fn get(&self, name: &str) -> Result<&Collection, StoreError> {
        self.by_name
            .get(name)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Collection, StoreError> {
        self.by_name
            .get_mut(name)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))
    }

    fn get_or_create(&mut self, name: &str) -> &mut Collection {
        if !self.by_name.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.by_name.entry(name.to_string()).or_default()
    }
}

/// In-memory document store.
///
/// Clone-friendly via Arc: every clone sees the same collections. State lives
/// as long as the last handle does.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<RwLock<Collections>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store populated from `collection -> id -> record` seed data.
    ///
    /// Seed records are stored as given, system fields included.
    pub fn from_seed(seed: &SeedData) -> Self {
        let mut collections = Collections::default();
        for (name, records) in seed {
            let target = collections.get_or_create(name);
            let Some(records) = records.as_object() else {
                warn!(collection = %name, "seed collection is not an object, leaving it empty");
                continue;
            };
            for (id, record) in records {
                match record {
                    Value::Object(fields) => {
                        let mut fields = fields.clone();
                        fields.shift_remove("_id");
                        target.insert(id.clone(), fields);
                    }
                    _ => warn!(collection = %name, id = %id, "skipping non-object seed record"),
                }
            }
        }

        Self {
            collections: Arc::new(RwLock::new(collections)),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, StoreError> {
        self.collections
            .read()
            .map_err(|_| StoreError::LockPoisoned("read"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, StoreError> {
        self.collections
            .write()
            .map_err(|_| StoreError::LockPoisoned("write"))
    }

    fn existing<'a>(collection: &'a mut Collection, id: &str) -> Result<&'a mut Record, StoreError> {
        collection
            .entries
            .get_mut(id)
            .ok_or_else(|| StoreError::EntryNotFound(id.to_string()))
    }
}

impl DocumentStore for InMemoryStore {
    fn collection_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read()?.order.clone())
    }

    fn get_all(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        let collections = self.read()?;
        let target = collections.get(collection)?;
        Ok(target.iter().map(|(id, record)| with_id(record, id)).collect())
    }

    fn get(&self, collection: &str, id: &str) -> Result<Record, StoreError> {
        let collections = self.read()?;
        let target = collections.get(collection)?;
        target
            .entries
            .get(id)
            .map(|record| with_id(record, id))
            .ok_or_else(|| StoreError::EntryNotFound(id.to_string()))
    }

    fn add(&self, collection: &str, data: &Record) -> Result<Record, StoreError> {
        let mut record = Record::new();
        if let Some(owner) = data.get("_ownerId") {
            record.insert("_ownerId".into(), owner.clone());
        }
        assign_clean(&mut record, data);

        let mut collections = self.write()?;
        let target = collections.get_or_create(collection);

        let mut id = Uuid::new_v4().to_string();
        while target.entries.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }

        record.insert("_createdOn".into(), Value::from(now_millis()));
        let created = with_id(&record, &id);
        target.insert(id, record);
        Ok(created)
    }

    fn set(&self, collection: &str, id: &str, data: &Record) -> Result<Record, StoreError> {
        let mut collections = self.write()?;
        let existing = Self::existing(collections.get_mut(collection)?, id)?;

        let mut record = Record::new();
        assign_clean(&mut record, data);
        assign_system(&mut record, existing);
        record.insert("_updatedOn".into(), Value::from(now_millis()));

        *existing = record;
        Ok(with_id(existing, id))
    }

    fn merge(&self, collection: &str, id: &str, data: &Record) -> Result<Record, StoreError> {
        let mut collections = self.write()?;
        let existing = Self::existing(collections.get_mut(collection)?, id)?;

        let mut record = existing.clone();
        assign_clean(&mut record, data);
        record.insert("_updatedOn".into(), Value::from(now_millis()));

        *existing = record;
        Ok(with_id(existing, id))
    }

    fn delete(&self, collection: &str, id: &str) -> Result<Record, StoreError> {
        let mut collections = self.write()?;
        collections
            .get_mut(collection)?
            .remove(id)
            .ok_or_else(|| StoreError::EntryNotFound(id.to_string()))?;

        let mut result = Record::new();
        result.insert("_deletedOn".into(), Value::from(now_millis()));
        Ok(result)
    }

    fn query(&self, collection: &str, query: &Record) -> Result<Vec<Record>, StoreError> {
        let collections = self.read()?;
        let target = collections.get(collection)?;

        Ok(target
            .iter()
            .filter(|(_, record)| matches_query(record, query))
            .map(|(id, record)| with_id(record, id))
            .collect())
    }
}

fn matches_query(record: &Record, query: &Record) -> bool {
    query.iter().all(|(prop, expected)| {
        let actual = record.get(prop).unwrap_or(&Value::Null);
        match (expected, actual) {
            (Value::String(expected), Value::String(actual)) => {
                expected.to_lowercase() == actual.to_lowercase()
            }
            _ => loose_eq(expected, actual),
        }
    })
}
