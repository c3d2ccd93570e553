//! The unit of work the runner executes.

use async_trait::async_trait;
use log::debug;

use crate::errors::MigrationError;
use crate::store::{Database, Document};

/// A reversible change to the database.
///
/// A fresh instance is built from its registered factory for every `up` or `down` call, so
/// implementations should not rely on state surviving between calls. Returning `Err` halts
/// the current pass without recording the migration.
#[async_trait]
pub trait Migration: Send + Sync {
    async fn up(&self, db: &Database) -> Result<(), MigrationError>;

    async fn down(&self, db: &Database) -> Result<(), MigrationError>;
}

/// A migration that rewrites every document of one collection.
///
/// The engine visits each document, calls the callback, and writes the result back. There is
/// no isolation: if a pass dies halfway, the next attempt runs the callback again over
/// documents it has already rewritten, so callbacks must be idempotent per document (for
/// example, only add a field when it is missing).
pub trait DocumentMigration: Send + Sync {
    /// Collection whose documents are rewritten.
    ///
    /// This is independent of the scope the migration is registered under (`collection` in
    /// `#[migration]`). The two usually match, but nothing checks that they do: a migration
    /// ordered in the `users` scope may rewrite `profiles`.
    fn collection(&self) -> &str;

    fn upgrade_document(&self, document: &mut Document) -> Result<(), MigrationError>;

    fn downgrade_document(&self, document: &mut Document) -> Result<(), MigrationError>;
}

#[async_trait]
impl<T> Migration for T
where
    T: DocumentMigration,
{
    async fn up(&self, db: &Database) -> Result<(), MigrationError> {
        let collection = db.collection(self.collection());
        let visited = collection
            .transform_documents(|_, document| self.upgrade_document(document))
            .await?;
        debug!("upgraded {visited} document(s) in '{}'", collection.name());
        Ok(())
    }

    async fn down(&self, db: &Database) -> Result<(), MigrationError> {
        let collection = db.collection(self.collection());
        let visited = collection
            .transform_documents(|_, document| self.downgrade_document(document))
            .await?;
        debug!("downgraded {visited} document(s) in '{}'", collection.name());
        Ok(())
    }
}

/// Helpers for the field edits document migrations usually make.
pub trait DocumentExt {
    /// Sets `field` only when it is absent. Returns whether the document changed.
    fn add_field(&mut self, field: &str, value: impl Into<serde_json::Value>) -> bool;

    /// Removes `field` if present. Returns whether the document changed.
    fn remove_field(&mut self, field: &str) -> bool;

    /// Moves `from` to `to` when `from` exists and `to` does not.
    fn rename_field(&mut self, from: &str, to: &str) -> bool;
}

impl DocumentExt for Document {
    fn add_field(&mut self, field: &str, value: impl Into<serde_json::Value>) -> bool {
        if self.contains_key(field) {
            return false;
        }
        self.insert(field.to_string(), value.into());
        true
    }

    fn remove_field(&mut self, field: &str) -> bool {
        self.remove(field).is_some()
    }

    fn rename_field(&mut self, from: &str, to: &str) -> bool {
        if self.contains_key(to) {
            return false;
        }
        match self.remove(from) {
            Some(value) => {
                self.insert(to.to_string(), value);
                true
            }
            None => false,
        }
    }
}
