//! RedisJSON-backed document store.

use std::collections::BTreeSet;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde_json::Value;

use super::{Document, DocumentStore, validate_segment};
use crate::errors::StoreError;

const SCAN_COUNT: usize = 100;

/// Stores each document as a RedisJSON value at `{prefix}:{collection}:{id}`.
///
/// Requires a server with the RedisJSON module (Redis Stack or Redis 8+).
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn, prefix))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn collection_prefix(&self, collection: &str) -> Result<String, StoreError> {
        validate_segment(collection).map_err(|reason| StoreError::InvalidCollection {
            name: collection.to_string(),
            reason,
        })?;
        Ok(format!("{}:{}:", self.prefix, collection))
    }

    fn document_key(&self, collection: &str, id: &str) -> Result<String, StoreError> {
        let base = self.collection_prefix(collection)?;
        validate_segment(id).map_err(|reason| StoreError::InvalidDocumentId {
            collection: collection.to_string(),
            id: id.to_string(),
            reason,
        })?;
        Ok(format!("{base}{id}"))
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn list_ids(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        let base = self.collection_prefix(collection)?;
        let pattern = format!("{}*", escape_glob(&base));
        // SCAN may repeat keys; nested prefixes can also match, so keep single-segment ids only.
        let ids: BTreeSet<String> = self
            .scan_keys(&pattern)
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&base).map(str::to_string))
            .filter(|id| validate_segment(id).is_ok())
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let key = self.document_key(collection, id)?;
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("JSON.GET")
            .arg(&key)
            .arg("$")
            .query_async(&mut conn)
            .await?;

        let Some(json_str) = raw else {
            return Ok(None);
        };

        // JSON.GET with a `$` path returns an array of matches
        let values: Vec<Value> = serde_json::from_str(&json_str)?;
        match values.into_iter().next() {
            Some(Value::Object(document)) => Ok(Some(document)),
            Some(_) => Err(StoreError::NotADocument {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
            None => Ok(None),
        }
    }

    async fn insert(&self, collection: &str, id: &str, document: &Document) -> Result<bool, StoreError> {
        let key = self.document_key(collection, id)?;
        let json_str = serde_json::to_string(document)?;
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("JSON.SET")
            .arg(&key)
            .arg("$")
            .arg(&json_str)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn put(&self, collection: &str, id: &str, document: &Document) -> Result<(), StoreError> {
        let key = self.document_key(collection, id)?;
        let json_str = serde_json::to_string(document)?;
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("JSON.SET")
            .arg(&key)
            .arg("$")
            .arg(&json_str)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let key = self.document_key(collection, id)?;
        let mut conn = self.conn.clone();
        let removed: u64 = redis::cmd("DEL").arg(&key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    async fn drop_collection(&self, collection: &str) -> Result<u64, StoreError> {
        let ids = self.list_ids(collection).await?;
        if ids.is_empty() {
            return Ok(0);
        }

        let base = self.collection_prefix(collection)?;
        let keys: Vec<String> = ids.iter().map(|id| format!("{base}{id}")).collect();
        let mut conn = self.conn.clone();
        let removed: u64 = redis::cmd("DEL").arg(&keys).query_async(&mut conn).await?;
        Ok(removed)
    }
}

/// Escapes glob metacharacters so a literal key prefix can be used in `SCAN MATCH`.
fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("app:users:"), "app:users:");
        assert_eq!(escape_glob("a*b?[c]\\"), "a\\*b\\?\\[c\\]\\\\");
    }

    #[test]
    fn test_escape_glob_empty() {
        assert_eq!(escape_glob(""), "");
    }
}
