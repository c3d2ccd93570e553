//! docshift core library.
//!
//! Versioned, reversible migrations for document databases: discovery of registered
//! migrations, an applied-version ledger stored next to the data, and a runner that applies
//! or rolls back ranges of versions in order and stops at the first failure.

extern crate self as docshift;

pub mod cli;
pub mod config;
pub mod definition;
pub mod errors;
pub mod history;
pub mod locator;
pub mod migration;
pub mod runner;
pub mod store;
pub mod version;

pub use definition::{LocatedMigration, MigrationDefinition, MigrationFactory, MigrationRegistration};
pub use errors::*;
pub use history::{DEFAULT_LEDGER_COLLECTION, MigrationHistoryRecord, MigrationHistoryStore};
pub use locator::{MigrationLocator, MigrationLocatorBuilder};
pub use migration::{DocumentExt, DocumentMigration, Migration};
pub use runner::{
    Direction, ExecutedMigration, ExecutionFault, MigrationRunner, MigrationState, MigrationStatus, Resolution,
    RunOutcome, RunReport,
};
pub use store::{Collection, Database, Document, DocumentStore, MemoryStore, RedisStore};
pub use version::{DownTarget, MigrationVersion, UpTarget};

pub use docshift_macros::migration;

// Re-exported so migration crates can implement `Migration` and expand `#[migration]`
// without depending on these crates directly
pub use async_trait::async_trait;
pub use inventory;
pub use redis;
