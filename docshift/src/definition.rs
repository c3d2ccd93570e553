use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::migration::Migration;
use crate::version::MigrationVersion;

/// Builds a fresh migration instance for one `up` or `down` call.
pub type MigrationFactory = Arc<dyn Fn() -> Box<dyn Migration> + Send + Sync>;

/// Declarative metadata describing one registered migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationDefinition {
    /// Name of the implementing type, used in reports and errors.
    pub type_name: String,
    pub version: MigrationVersion,
    pub description: String,
}

impl MigrationDefinition {
    pub fn new(type_name: impl Into<String>, version: MigrationVersion, description: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            version,
            description: description.into(),
        }
    }
}

impl fmt::Display for MigrationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.version, self.description)
    }
}

/// A definition paired with the factory that builds its implementation.
#[derive(Clone)]
pub struct LocatedMigration {
    pub definition: MigrationDefinition,
    factory: MigrationFactory,
}

impl LocatedMigration {
    pub fn new(definition: MigrationDefinition, factory: MigrationFactory) -> Self {
        Self { definition, factory }
    }

    pub fn version(&self) -> &MigrationVersion {
        &self.definition.version
    }

    pub fn instantiate(&self) -> Box<dyn Migration> {
        (self.factory)()
    }
}

impl fmt::Debug for LocatedMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocatedMigration")
            .field("definition", &self.definition)
            .field("factory", &"<factory>")
            .finish()
    }
}

/// Build-time registration emitted by the `#[migration(...)]` attribute.
///
/// Each annotated type submits one of these to the inventory, so linking a migration into
/// the binary is all it takes for [`MigrationLocator::discover`](crate::MigrationLocator::discover)
/// to find it.
pub struct MigrationRegistration {
    /// The name of the migration type (e.g., "AddIsActive")
    pub type_name: &'static str,
    pub number: i64,
    /// Collection scope, or `None` for a global migration
    pub collection: Option<&'static str>,
    pub description: &'static str,
    pub factory: fn() -> Box<dyn Migration>,
}

// Collect all MigrationRegistration instances via inventory
inventory::collect!(MigrationRegistration);

impl MigrationRegistration {
    pub fn version(&self) -> MigrationVersion {
        MigrationVersion::new(self.collection, self.number)
    }

    pub fn located(&self) -> LocatedMigration {
        let factory = self.factory;
        LocatedMigration::new(
            MigrationDefinition::new(self.type_name, self.version(), self.description),
            Arc::new(factory),
        )
    }
}

/// Every migration registered through the attribute macro and linked into this binary.
pub fn registered_migrations() -> impl Iterator<Item = &'static MigrationRegistration> {
    inventory::iter::<MigrationRegistration>()
}
