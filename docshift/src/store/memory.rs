use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{Document, DocumentStore};
use crate::errors::StoreError;

type Collections = BTreeMap<String, BTreeMap<String, Document>>;

/// Process-local document store.
///
/// Every call takes the lock once, so each operation is atomic on its own.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.collections.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Collections> {
        self.collections.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_ids(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .read()
            .get(collection)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.read().get(collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn insert(&self, collection: &str, id: &str, document: &Document) -> Result<bool, StoreError> {
        let mut collections = self.write();
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(id) {
            return Ok(false);
        }
        docs.insert(id.to_string(), document.clone());
        Ok(true)
    }

    async fn put(&self, collection: &str, id: &str, document: &Document) -> Result<(), StoreError> {
        self.write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document.clone());
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .write()
            .get_mut(collection)
            .is_some_and(|docs| docs.remove(id).is_some()))
    }

    async fn drop_collection(&self, collection: &str) -> Result<u64, StoreError> {
        Ok(self
            .write()
            .remove(collection)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(n: i64) -> Document {
        json!({ "n": n }).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn ids_are_sorted_and_scoped_to_collection() {
        let store = MemoryStore::new();
        store.put("a", "2", &doc(2)).await.unwrap();
        store.put("a", "1", &doc(1)).await.unwrap();
        store.put("b", "9", &doc(9)).await.unwrap();

        assert_eq!(store.list_ids("a").await.unwrap(), vec!["1", "2"]);
        assert_eq!(store.list_ids("b").await.unwrap(), vec!["9"]);
        assert!(store.list_ids("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_does_not_overwrite() {
        let store = MemoryStore::new();
        assert!(store.insert("a", "1", &doc(1)).await.unwrap());
        assert!(!store.insert("a", "1", &doc(2)).await.unwrap());
        assert_eq!(store.get("a", "1").await.unwrap(), Some(doc(1)));
    }

    #[tokio::test]
    async fn drop_reports_removed_documents() {
        let store = MemoryStore::new();
        store.put("a", "1", &doc(1)).await.unwrap();
        store.put("a", "2", &doc(2)).await.unwrap();
        assert_eq!(store.drop_collection("a").await.unwrap(), 2);
        assert_eq!(store.drop_collection("a").await.unwrap(), 0);
        assert!(!store.delete("a", "1").await.unwrap());
    }
}
