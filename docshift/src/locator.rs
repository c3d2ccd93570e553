//! Migration discovery and range queries.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use crate::definition::{LocatedMigration, MigrationDefinition, registered_migrations};
use crate::errors::DiscoveryError;
use crate::migration::Migration;
use crate::store::validate_segment;
use crate::version::MigrationVersion;

/// The set of migrations visible to this process, keyed by version.
///
/// Built once (from the inventory or explicit registration) and queried by the runner on
/// every pass. Construction validates every definition and fails closed: a single bad or
/// duplicate registration rejects the whole set.
#[derive(Debug, Clone, Default)]
pub struct MigrationLocator {
    migrations: BTreeMap<MigrationVersion, LocatedMigration>,
}

impl MigrationLocator {
    /// Discovers every migration registered with `#[migration(...)]` and linked into the binary.
    pub fn discover() -> Result<Self, DiscoveryError> {
        let mut builder = Self::builder();
        for registration in registered_migrations() {
            builder = builder.add(registration.located());
        }
        let locator = builder.build()?;
        debug!("discovered {} registered migration(s)", locator.len());
        Ok(locator)
    }

    pub fn builder() -> MigrationLocatorBuilder {
        MigrationLocatorBuilder::default()
    }

    /// Definitions whose version lies in `[low, high]`, ascending.
    pub fn query(&self, low: &MigrationVersion, high: &MigrationVersion) -> Vec<&LocatedMigration> {
        if low > high {
            return Vec::new();
        }
        self.migrations.range(low..=high).map(|(_, located)| located).collect()
    }

    pub fn get(&self, version: &MigrationVersion) -> Option<&LocatedMigration> {
        self.migrations.get(version)
    }

    /// All definitions, ascending.
    pub fn definitions(&self) -> impl Iterator<Item = &MigrationDefinition> {
        self.migrations.values().map(|located| &located.definition)
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

/// Explicit registration path for migrations that are not annotated, or for tests.
#[derive(Default)]
pub struct MigrationLocatorBuilder {
    pending: Vec<LocatedMigration>,
}

impl MigrationLocatorBuilder {
    /// Registers a migration built by `factory` under `definition`.
    pub fn register<F>(self, definition: MigrationDefinition, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Migration> + Send + Sync + 'static,
    {
        self.add(LocatedMigration::new(definition, Arc::new(factory)))
    }

    pub fn add(mut self, located: LocatedMigration) -> Self {
        self.pending.push(located);
        self
    }

    pub fn build(self) -> Result<MigrationLocator, DiscoveryError> {
        let mut migrations: BTreeMap<MigrationVersion, LocatedMigration> = BTreeMap::new();

        for located in self.pending {
            validate_definition(&located.definition)?;

            let version = located.version().clone();
            if let Some(existing) = migrations.get(&version) {
                return Err(DiscoveryError::DuplicateVersion {
                    version,
                    first: existing.definition.type_name.clone(),
                    second: located.definition.type_name.clone(),
                });
            }
            migrations.insert(version, located);
        }

        Ok(MigrationLocator { migrations })
    }
}

fn validate_definition(definition: &MigrationDefinition) -> Result<(), DiscoveryError> {
    if definition.type_name.trim().is_empty() {
        return Err(DiscoveryError::MissingMetadata {
            type_name: "<unnamed>".to_string(),
            field: "type_name",
        });
    }
    if definition.description.trim().is_empty() {
        return Err(DiscoveryError::MissingMetadata {
            type_name: definition.type_name.clone(),
            field: "description",
        });
    }
    if let Some(scope) = definition.version.scope()
        && validate_segment(scope).is_err()
    {
        return Err(DiscoveryError::InvalidScope {
            type_name: definition.type_name.clone(),
            scope: scope.to_string(),
        });
    }
    Ok(())
}
