//! Document storage seen by migrations and the ledger.
//!
//! - `DocumentStore` - backend trait (RedisJSON or in-memory)
//! - `Database` - cheap-to-clone handle handed to every migration
//! - `Collection` - per-collection accessor with the read-transform-write helper

mod memory;
mod redis_json;

pub use self::memory::MemoryStore;
pub use self::redis_json::RedisStore;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::{MigrationError, StoreError};

/// A stored document: a JSON object keyed by field name.
pub type Document = Map<String, Value>;

/// Backend holding named collections of JSON documents.
///
/// Implementations only need per-call atomicity; the engine never asks for transactions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Ids of every document in `collection`, sorted ascending.
    async fn list_ids(&self, collection: &str) -> Result<Vec<String>, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Create-if-absent. Returns `false` without writing when `id` already exists.
    async fn insert(&self, collection: &str, id: &str, document: &Document) -> Result<bool, StoreError>;

    /// Create or overwrite.
    async fn put(&self, collection: &str, id: &str, document: &Document) -> Result<(), StoreError>;

    /// Returns `false` when there was nothing to delete.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Deletes every document in `collection`, returning how many were removed.
    async fn drop_collection(&self, collection: &str) -> Result<u64, StoreError>;
}

/// Handle to the database being migrated.
///
/// Counts every document write that goes through it so runs can report how much data a
/// migration touched.
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn DocumentStore>,
    writes: Arc<AtomicU64>,
}

impl Database {
    pub fn new(store: impl DocumentStore + 'static) -> Self {
        Self::from_arc(Arc::new(store))
    }

    pub fn from_arc(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// In-process database, mostly useful for tests.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Connect to a RedisJSON-enabled server; documents live under `prefix`.
    pub async fn connect_redis(url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        Ok(Self::new(RedisStore::connect(url, prefix).await?))
    }

    pub fn collection(&self, name: impl Into<String>) -> Collection {
        Collection {
            name: name.into(),
            db: self.clone(),
        }
    }

    /// Total document writes (inserts, replacements, deletions) made through this handle.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn count_writes(&self, n: u64) {
        self.writes.fetch_add(n, Ordering::Relaxed);
    }
}

/// Accessor for one named collection.
#[derive(Clone)]
pub struct Collection {
    name: String,
    db: Database,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn ids(&self) -> Result<Vec<String>, StoreError> {
        self.db.store.list_ids(&self.name).await
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.ids().await?.len())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        self.db.store.get(&self.name, id).await
    }

    /// Every document in id order.
    pub async fn documents(&self) -> Result<Vec<(String, Document)>, StoreError> {
        let mut out = Vec::new();
        for id in self.ids().await? {
            if let Some(document) = self.get(&id).await? {
                out.push((id, document));
            }
        }
        Ok(out)
    }

    pub async fn insert(&self, id: &str, document: &Document) -> Result<bool, StoreError> {
        let inserted = self.db.store.insert(&self.name, id, document).await?;
        if inserted {
            self.db.count_writes(1);
        }
        Ok(inserted)
    }

    /// Serializes `value` (which must encode as a JSON object) and inserts it.
    pub async fn insert_value<T: serde::Serialize>(&self, id: &str, value: &T) -> Result<bool, StoreError> {
        let document = to_document(&self.name, id, value)?;
        self.insert(id, &document).await
    }

    pub async fn replace(&self, id: &str, document: &Document) -> Result<(), StoreError> {
        self.db.store.put(&self.name, id, document).await?;
        self.db.count_writes(1);
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let deleted = self.db.store.delete(&self.name, id).await?;
        if deleted {
            self.db.count_writes(1);
        }
        Ok(deleted)
    }

    pub async fn drop(&self) -> Result<u64, StoreError> {
        let removed = self.db.store.drop_collection(&self.name).await?;
        self.db.count_writes(removed);
        Ok(removed)
    }

    /// Reads every document, hands it to `transform`, and writes it back in place.
    ///
    /// Documents are visited one at a time in id order with no batching or isolation. A
    /// failure stops the loop, leaving already-visited documents rewritten, so transforms
    /// must tolerate being re-applied to their own output.
    pub async fn transform_documents<F>(&self, mut transform: F) -> Result<u64, MigrationError>
    where
        F: FnMut(&str, &mut Document) -> Result<(), MigrationError> + Send,
    {
        let mut visited = 0u64;
        for id in self.ids().await? {
            // Removed between listing and reading.
            let Some(mut document) = self.get(&id).await? else {
                continue;
            };
            transform(&id, &mut document)?;
            self.replace(&id, &document).await?;
            visited += 1;
        }
        Ok(visited)
    }
}

fn to_document<T: serde::Serialize>(collection: &str, id: &str, value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(document) => Ok(document),
        _ => Err(StoreError::NotADocument {
            collection: collection.to_string(),
            id: id.to_string(),
        }),
    }
}

/// Rejects names that cannot be used as a single key segment.
pub(crate) fn validate_segment(value: &str) -> Result<(), &'static str> {
    if value.is_empty() {
        return Err("must not be empty");
    }
    if value.contains(':') {
        return Err("must not contain ':'");
    }
    if value.chars().any(char::is_whitespace) {
        return Err("must not contain whitespace");
    }
    Ok(())
}
