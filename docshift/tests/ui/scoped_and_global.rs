use docshift::{Database, Migration, MigrationError, MigrationLocator, MigrationVersion, async_trait, migration};

#[migration(number = 1, description = "Create indexes")]
#[derive(Default)]
struct CreateIndexes;

#[migration(number = 1, description = "Backfill user slugs", collection = "users")]
#[derive(Default)]
struct BackfillSlugs;

#[async_trait]
impl Migration for CreateIndexes {
    async fn up(&self, _db: &Database) -> Result<(), MigrationError> {
        Ok(())
    }

    async fn down(&self, _db: &Database) -> Result<(), MigrationError> {
        Ok(())
    }
}

#[async_trait]
impl Migration for BackfillSlugs {
    async fn up(&self, _db: &Database) -> Result<(), MigrationError> {
        Ok(())
    }

    async fn down(&self, _db: &Database) -> Result<(), MigrationError> {
        Ok(())
    }
}

fn main() {
    let locator = MigrationLocator::discover().unwrap();
    assert_eq!(locator.len(), 2);
    assert!(locator.get(&MigrationVersion::global(1)).is_some());
    assert!(locator.get(&MigrationVersion::scoped("users", 1)).is_some());
}
