//! Applied-migration ledger stored alongside the data it describes.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, StoreError};
use crate::store::{Collection, Database, Document};
use crate::version::MigrationVersion;

/// Default collection holding ledger records.
pub const DEFAULT_LEDGER_COLLECTION: &str = "_migrations";

/// One applied migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationHistoryRecord {
    pub scope: Option<String>,
    pub number: i64,
    pub description: String,
    pub applied_at: DateTime<Utc>,
}

impl MigrationHistoryRecord {
    pub fn version(&self) -> MigrationVersion {
        MigrationVersion::new(self.scope.as_deref(), self.number)
    }
}

/// Ledger of applied versions.
///
/// A record exists for a version exactly when that version has been applied and not rolled
/// back. Each record is its own document, keyed by [`record_id`], so inserting one is
/// create-if-absent at the store and a racing duplicate is reported rather than overwritten.
#[derive(Clone)]
pub struct MigrationHistoryStore {
    collection: Collection,
}

impl MigrationHistoryStore {
    pub fn new(db: &Database) -> Self {
        Self::with_collection(db, DEFAULT_LEDGER_COLLECTION)
    }

    pub fn with_collection(db: &Database, collection: impl Into<String>) -> Self {
        Self {
            collection: db.collection(collection),
        }
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    /// Every record, optionally restricted to one scope, ordered by version.
    pub async fn records(&self, scope: Option<&str>) -> Result<Vec<MigrationHistoryRecord>, LedgerError> {
        let mut records = Vec::new();
        for (id, document) in self.collection.documents().await? {
            let record = decode_record(&id, document)?;
            if scope.is_none() || record.scope.as_deref() == scope {
                records.push(record);
            }
        }
        records.sort_by_key(MigrationHistoryRecord::version);
        Ok(records)
    }

    /// Applied versions; `None` returns the whole ledger, `Some(scope)` only that scope.
    pub async fn applied_versions(&self, scope: Option<&str>) -> Result<BTreeSet<MigrationVersion>, LedgerError> {
        Ok(self
            .records(scope)
            .await?
            .iter()
            .map(MigrationHistoryRecord::version)
            .collect())
    }

    pub async fn is_applied(&self, version: &MigrationVersion) -> Result<bool, LedgerError> {
        Ok(self.collection.get(&record_id(version)).await?.is_some())
    }

    /// Inserts the ledger record for `version`.
    ///
    /// Fails with [`LedgerError::AlreadyApplied`] when a record already exists; the caller's
    /// view of the ledger was stale.
    pub async fn record_applied(
        &self,
        version: &MigrationVersion,
        description: &str,
    ) -> Result<MigrationHistoryRecord, LedgerError> {
        let record = MigrationHistoryRecord {
            scope: version.scope.clone(),
            number: version.number,
            description: description.to_string(),
            applied_at: Utc::now(),
        };
        let id = record_id(version);
        let document = self.encode_record(&id, &record)?;

        if !self.collection.insert(&id, &document).await? {
            return Err(LedgerError::AlreadyApplied(version.clone()));
        }
        Ok(record)
    }

    /// Deletes the ledger record for `version`.
    ///
    /// Fails with [`LedgerError::NotApplied`] when there is nothing to delete.
    pub async fn record_rolled_back(&self, version: &MigrationVersion) -> Result<(), LedgerError> {
        if !self.collection.delete(&record_id(version)).await? {
            return Err(LedgerError::NotApplied(version.clone()));
        }
        Ok(())
    }

    fn encode_record(&self, id: &str, record: &MigrationHistoryRecord) -> Result<Document, StoreError> {
        match serde_json::to_value(record)? {
            serde_json::Value::Object(document) => Ok(document),
            _ => Err(StoreError::NotADocument {
                collection: self.collection.name().to_string(),
                id: id.to_string(),
            }),
        }
    }
}

/// Ledger document id for a version: `g.<number>` or `c.<scope>.<number>`.
///
/// The number is always the final `.`-separated part, so distinct versions never share an id
/// even when a scope contains dots.
pub fn record_id(version: &MigrationVersion) -> String {
    match version.scope() {
        Some(scope) => format!("c.{scope}.{}", version.number),
        None => format!("g.{}", version.number),
    }
}

fn decode_record(id: &str, document: Document) -> Result<MigrationHistoryRecord, LedgerError> {
    serde_json::from_value(serde_json::Value::Object(document)).map_err(|source| LedgerError::CorruptRecord {
        id: id.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> MigrationHistoryStore {
        MigrationHistoryStore::new(&Database::in_memory())
    }

    #[test]
    fn test_record_ids() {
        assert_eq!(record_id(&MigrationVersion::global(3)), "g.3");
        assert_eq!(record_id(&MigrationVersion::global(-1)), "g.-1");
        assert_eq!(record_id(&MigrationVersion::scoped("users", 12)), "c.users.12");
        assert_ne!(
            record_id(&MigrationVersion::scoped("a.1", 2)),
            record_id(&MigrationVersion::scoped("a", 12))
        );
    }

    #[tokio::test]
    async fn record_then_roll_back() {
        let ledger = ledger();
        let v1 = MigrationVersion::global(1);
        let record = ledger.record_applied(&v1, "first").await.unwrap();
        assert_eq!(record.version(), v1);
        assert!(ledger.is_applied(&v1).await.unwrap());

        ledger.record_rolled_back(&v1).await.unwrap();
        assert!(!ledger.is_applied(&v1).await.unwrap());
        assert!(ledger.applied_versions(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn double_apply_is_surfaced() {
        let ledger = ledger();
        let v = MigrationVersion::scoped("users", 2);
        ledger.record_applied(&v, "once").await.unwrap();

        let err = ledger.record_applied(&v, "twice").await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyApplied(ref version) if *version == v));

        let records = ledger.records(None).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description, "once");
    }

    #[tokio::test]
    async fn rolling_back_missing_record_is_surfaced() {
        let err = ledger().record_rolled_back(&MigrationVersion::global(9)).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotApplied(_)));
    }

    #[tokio::test]
    async fn applied_versions_filters_by_scope() {
        let ledger = ledger();
        ledger.record_applied(&MigrationVersion::global(1), "g").await.unwrap();
        ledger.record_applied(&MigrationVersion::scoped("users", 1), "u").await.unwrap();
        ledger.record_applied(&MigrationVersion::scoped("posts", 1), "p").await.unwrap();

        let users = ledger.applied_versions(Some("users")).await.unwrap();
        assert_eq!(users.into_iter().collect::<Vec<_>>(), vec![MigrationVersion::scoped("users", 1)]);
        assert_eq!(ledger.applied_versions(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn corrupt_record_is_reported() {
        let db = Database::in_memory();
        let ledger = MigrationHistoryStore::new(&db);
        let junk = serde_json::json!({"number": "not a number"});
        db.collection(DEFAULT_LEDGER_COLLECTION)
            .insert("g.1", junk.as_object().unwrap())
            .await
            .unwrap();

        let err = ledger.records(None).await.unwrap_err();
        assert!(matches!(err, LedgerError::CorruptRecord { ref id, .. } if id == "g.1"));
    }

    #[test]
    fn test_record_serialization() {
        let record = MigrationHistoryRecord {
            scope: None,
            number: 4,
            description: "add index".to_string(),
            applied_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"scope\":null"));
        let back: MigrationHistoryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
