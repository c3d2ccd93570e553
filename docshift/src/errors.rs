use std::borrow::Cow;

use thiserror::Error;

use crate::runner::Direction;
use crate::version::MigrationVersion;

/// Failure raised by a [`DocumentStore`](crate::store::DocumentStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A document could not be encoded or decoded as JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Collection name cannot be mapped onto the store's key layout.
    #[error("invalid collection name '{name}': {reason}")]
    InvalidCollection { name: String, reason: &'static str },

    /// Document id cannot be mapped onto the store's key layout.
    #[error("invalid document id '{id}' in collection '{collection}': {reason}")]
    InvalidDocumentId {
        collection: String,
        id: String,
        reason: &'static str,
    },

    /// Stored value exists but is not a JSON object.
    #[error("value stored at {collection}/{id} is not a document")]
    NotADocument { collection: String, id: String },
}

/// Fault returned by a migration's `up`/`down` body.
///
/// Store failures convert into this type so `?` works inside migrations; authors can
/// also raise their own fault with [`MigrationError::custom`] or any `anyhow::Error`.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A document did not have the shape the transform expects.
    #[error("document {id} in '{collection}' rejected: {message}")]
    InvalidDocument {
        collection: String,
        id: String,
        message: String,
    },

    #[error("{message}")]
    Custom { message: Cow<'static, str> },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MigrationError {
    pub fn custom(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }
}

/// Discovery failed; no migration may run.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A registration lacks a piece of required declarative metadata.
    #[error("migration {type_name} is missing required metadata: {field}")]
    MissingMetadata {
        type_name: String,
        field: &'static str,
    },

    /// Scope name cannot be used as a ledger/collection key segment.
    #[error("migration {type_name} declares invalid collection scope '{scope}'")]
    InvalidScope { type_name: String, scope: String },

    /// Two registrations claim the same `(scope, number)` position.
    #[error("duplicate migration version {version}: declared by both {first} and {second}")]
    DuplicateVersion {
        version: MigrationVersion,
        first: String,
        second: String,
    },
}

/// The applied-migration ledger disagrees with what the caller expected.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// `record_applied` found an existing record.
    #[error("migration {0} is already recorded as applied")]
    AlreadyApplied(MigrationVersion),

    /// `record_rolled_back` found no record.
    #[error("migration {0} is not recorded as applied")]
    NotApplied(MigrationVersion),

    /// A ledger document could not be decoded.
    #[error("ledger record '{id}' is corrupt: {source}")]
    CorruptRecord {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Top-level error type returned by the runner for anything that is not an
/// execution fault inside a migration body.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// A migration body finished but its ledger update did not, so the data and the ledger
    /// disagree about `version`. `completed` lists the migrations of the same pass that were
    /// recorded before it.
    #[error("{direction} migration {version} ran but the ledger was not updated: {source}")]
    LedgerWrite {
        direction: Direction,
        version: MigrationVersion,
        completed: Vec<MigrationVersion>,
        #[source]
        source: LedgerError,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
