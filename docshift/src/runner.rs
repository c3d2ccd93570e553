//! Orchestration of up/down passes.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::definition::{LocatedMigration, MigrationDefinition};
use crate::errors::{EngineError, MigrationError};
use crate::history::MigrationHistoryStore;
use crate::locator::MigrationLocator;
use crate::store::Database;
use crate::version::{DownTarget, MigrationVersion, UpTarget};

/// Which way a pass moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

/// One migration that completed during a pass.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutedMigration {
    pub definition: MigrationDefinition,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
    /// Document writes made by the migration body
    pub documents_written: u64,
}

/// The migration that stopped a pass and why.
#[derive(Debug)]
pub struct ExecutionFault {
    pub definition: MigrationDefinition,
    pub cause: MigrationError,
}

impl fmt::Display for ExecutionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "migration {} failed: {}", self.definition, self.cause)
    }
}

/// Terminal state of a pass.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every candidate completed.
    Done,
    /// A candidate faulted; nothing after it ran.
    Halted(ExecutionFault),
}

/// Summary of one up or down pass.
#[derive(Debug)]
pub struct RunReport {
    pub direction: Direction,
    pub scope: Option<String>,
    /// Candidates selected after filtering against the ledger.
    pub found: usize,
    /// Completed migrations in execution order.
    pub executed: Vec<ExecutedMigration>,
    pub outcome: RunOutcome,
    /// Total execution time in milliseconds
    pub total_time_ms: u64,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.executed.len()
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, RunOutcome::Done)
    }

    pub fn fault(&self) -> Option<&ExecutionFault> {
        match &self.outcome {
            RunOutcome::Halted(fault) => Some(fault),
            RunOutcome::Done => None,
        }
    }

    pub fn documents_written(&self) -> u64 {
        self.executed.iter().map(|m| m.documents_written).sum()
    }
}

/// Ledger state of one migration as reported by [`MigrationRunner::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationState {
    Applied { applied_at: DateTime<Utc> },
    Pending,
    /// Recorded in the ledger but not discovered in this build.
    Orphaned { applied_at: DateTime<Utc> },
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub version: MigrationVersion,
    pub description: String,
    pub type_name: Option<String>,
    #[serde(flatten)]
    pub state: MigrationState,
}

/// How `resolve` should rewrite the ledger for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Applied { description: Option<String> },
    RolledBack,
}

/// Drives migrations against one database.
///
/// Passes are strictly sequential: each migration's ledger update completes before the next
/// migration starts. There is no locking, so two runners against the same database and scope
/// can both see a version as pending.
pub struct MigrationRunner {
    db: Database,
    locator: MigrationLocator,
    history: MigrationHistoryStore,
}

impl MigrationRunner {
    pub fn new(db: Database, locator: MigrationLocator) -> Self {
        let history = MigrationHistoryStore::new(&db);
        Self { db, locator, history }
    }

    /// Store the ledger in `collection` instead of the default.
    pub fn with_ledger_collection(mut self, collection: impl Into<String>) -> Self {
        self.history = MigrationHistoryStore::with_collection(&self.db, collection);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn locator(&self) -> &MigrationLocator {
        &self.locator
    }

    pub fn history(&self) -> &MigrationHistoryStore {
        &self.history
    }

    /// Applies every pending migration in `scope` up to `target`, ascending.
    ///
    /// Returns `Ok` with a halted report when a migration body faults; earlier migrations
    /// of the pass stay applied and the faulting one is not recorded. Ledger and store
    /// failures outside migration bodies are returned as `Err`; a ledger write that fails
    /// after its migration ran comes back as [`EngineError::LedgerWrite`].
    pub async fn up(&self, scope: Option<&str>, target: UpTarget) -> Result<RunReport, EngineError> {
        let started = Instant::now();

        let applied = self.history.applied_versions(scope).await?;
        let candidates = self.pending_up(scope, target, &applied);
        info!(
            "found {} pending migration(s) for {} (target {target:?})",
            candidates.len(),
            scope_label(scope)
        );

        self.execute(Direction::Up, scope, candidates, started).await
    }

    /// Rolls back every applied migration in `scope` above `target`, descending.
    pub async fn down(&self, scope: Option<&str>, target: DownTarget) -> Result<RunReport, EngineError> {
        let started = Instant::now();

        let applied = self.history.applied_versions(scope).await?;
        let candidates = self.applied_down(scope, target, &applied);
        info!(
            "found {} applied migration(s) to roll back for {} (target {target:?})",
            candidates.len(),
            scope_label(scope)
        );

        self.execute(Direction::Down, scope, candidates, started).await
    }

    fn pending_up(
        &self,
        scope: Option<&str>,
        target: UpTarget,
        applied: &BTreeSet<MigrationVersion>,
    ) -> Vec<&LocatedMigration> {
        let low = MigrationVersion::min(scope);
        let high = target.upper_bound(scope);
        // Membership uses each candidate's own (scope, number), not the caller's scope.
        let mut candidates: Vec<_> = self
            .locator
            .query(&low, &high)
            .into_iter()
            .filter(|m| !applied.contains(m.version()))
            .collect();
        candidates.sort_by(|a, b| a.version().cmp(b.version()));
        candidates
    }

    fn applied_down(
        &self,
        scope: Option<&str>,
        target: DownTarget,
        applied: &BTreeSet<MigrationVersion>,
    ) -> Vec<&LocatedMigration> {
        let Some(low) = target.lower_bound(scope) else {
            return Vec::new();
        };
        let high = MigrationVersion::max(scope);
        let mut candidates: Vec<_> = self
            .locator
            .query(&low, &high)
            .into_iter()
            .filter(|m| applied.contains(m.version()))
            .collect();
        candidates.sort_by(|a, b| b.version().cmp(a.version()));
        candidates
    }

    async fn execute(
        &self,
        direction: Direction,
        scope: Option<&str>,
        candidates: Vec<&LocatedMigration>,
        started: Instant,
    ) -> Result<RunReport, EngineError> {
        let found = candidates.len();
        let mut executed: Vec<ExecutedMigration> = Vec::with_capacity(found);
        let mut outcome = RunOutcome::Done;

        for located in candidates {
            let definition = &located.definition;
            debug!("running {direction} for {definition}");

            let migration_start = Instant::now();
            let writes_before = self.db.writes();
            let migration = located.instantiate();
            let result = match direction {
                Direction::Up => migration.up(&self.db).await,
                Direction::Down => migration.down(&self.db).await,
            };

            if let Err(cause) = result {
                error!("could not apply {direction} migration {definition}: {cause}");
                outcome = RunOutcome::Halted(ExecutionFault {
                    definition: definition.clone(),
                    cause,
                });
                break;
            }

            let documents_written = self.db.writes().saturating_sub(writes_before);
            let recorded = match direction {
                Direction::Up => {
                    self.history
                        .record_applied(&definition.version, &definition.description)
                        .await
                        .map(drop)
                }
                Direction::Down => self.history.record_rolled_back(&definition.version).await,
            };
            if let Err(source) = recorded {
                error!("{direction} migration {definition} ran but its ledger update failed: {source}");
                return Err(EngineError::LedgerWrite {
                    direction,
                    version: definition.version.clone(),
                    completed: executed.into_iter().map(|m| m.definition.version).collect(),
                    source,
                });
            }

            let execution_time_ms = migration_start.elapsed().as_millis() as u64;
            info!("applied {direction} migration {definition} in {execution_time_ms}ms");
            executed.push(ExecutedMigration {
                definition: definition.clone(),
                execution_time_ms,
                documents_written,
            });
        }

        if let RunOutcome::Halted(fault) = &outcome {
            warn!(
                "{direction} pass halted at {} after {} of {found} migration(s)",
                fault.definition.version,
                executed.len()
            );
        }

        Ok(RunReport {
            direction,
            scope: scope.map(str::to_string),
            found,
            executed,
            outcome,
            total_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Every discovered migration in `scope` with its ledger state, plus ledger records with
    /// no discovered migration. `None` lists every scope.
    pub async fn status(&self, scope: Option<&str>) -> Result<Vec<MigrationStatus>, EngineError> {
        let records = self.history.records(scope).await?;
        let mut statuses: Vec<MigrationStatus> = self
            .locator
            .definitions()
            .filter(|d| scope.is_none() || d.version.in_scope(scope))
            .map(|d| {
                let state = records
                    .iter()
                    .find(|r| r.version() == d.version)
                    .map_or(MigrationState::Pending, |r| MigrationState::Applied {
                        applied_at: r.applied_at,
                    });
                MigrationStatus {
                    version: d.version.clone(),
                    description: d.description.clone(),
                    type_name: Some(d.type_name.clone()),
                    state,
                }
            })
            .collect();

        for record in records {
            let version = record.version();
            if self.locator.get(&version).is_none() {
                statuses.push(MigrationStatus {
                    version,
                    description: record.description,
                    type_name: None,
                    state: MigrationState::Orphaned {
                        applied_at: record.applied_at,
                    },
                });
            }
        }

        statuses.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(statuses)
    }

    /// Rewrites the ledger for `version` without running the migration.
    ///
    /// Returns `false` when the ledger already reflects `resolution`.
    pub async fn resolve(&self, version: &MigrationVersion, resolution: Resolution) -> Result<bool, EngineError> {
        let applied = self.history.is_applied(version).await?;
        match resolution {
            Resolution::Applied { description } => {
                if applied {
                    return Ok(false);
                }
                let description = description
                    .or_else(|| self.locator.get(version).map(|m| m.definition.description.clone()))
                    .unwrap_or_else(|| "resolved manually".to_string());
                self.history.record_applied(version, &description).await?;
                info!("marked {version} as applied");
            }
            Resolution::RolledBack => {
                if !applied {
                    return Ok(false);
                }
                self.history.record_rolled_back(version).await?;
                info!("marked {version} as rolled back");
            }
        }
        Ok(true)
    }
}

fn scope_label(scope: Option<&str>) -> String {
    match scope {
        Some(scope) => format!("collection '{scope}'"),
        None => "global scope".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{LedgerError, StoreError};
    use crate::store::{Document, DocumentStore, MemoryStore};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    type CallLog = Arc<Mutex<Vec<String>>>;

    struct Recording {
        label: String,
        number: i64,
        log: CallLog,
        fail_up: bool,
        /// Number whose `down` faults, shared so a test can clear it between passes.
        failing_down: Arc<Mutex<Option<i64>>>,
    }

    #[async_trait]
    impl crate::migration::Migration for Recording {
        async fn up(&self, db: &Database) -> Result<(), MigrationError> {
            self.log.lock().unwrap().push(format!("up {}", self.label));
            if self.fail_up {
                return Err(MigrationError::custom("boom"));
            }
            db.collection("touched")
                .replace(&self.label.replace('#', "n"), &serde_json::Map::new())
                .await?;
            Ok(())
        }

        async fn down(&self, _db: &Database) -> Result<(), MigrationError> {
            self.log.lock().unwrap().push(format!("down {}", self.label));
            if *self.failing_down.lock().unwrap() == Some(self.number) {
                return Err(MigrationError::custom("cannot undo"));
            }
            Ok(())
        }
    }

    struct Fixture {
        log: CallLog,
        failing_down: Arc<Mutex<Option<i64>>>,
        runner: MigrationRunner,
    }

    impl Fixture {
        fn calls(&self) -> Vec<String> {
            std::mem::take(&mut *self.log.lock().unwrap())
        }

        async fn applied(&self, scope: Option<&str>) -> Vec<i64> {
            self.runner
                .history()
                .applied_versions(scope)
                .await
                .unwrap()
                .into_iter()
                .map(|v| v.number)
                .collect()
        }
    }

    /// Builds a runner over `(scope, number, fails)` migrations on a fresh in-memory database.
    fn fixture(entries: &[(Option<&str>, i64, bool)]) -> Fixture {
        fixture_on(Database::in_memory(), entries)
    }

    fn fixture_on(db: Database, entries: &[(Option<&str>, i64, bool)]) -> Fixture {
        let log: CallLog = Arc::default();
        let failing_down: Arc<Mutex<Option<i64>>> = Arc::default();
        let mut builder = MigrationLocator::builder();
        for &(scope, number, fail_up) in entries {
            let version = MigrationVersion::new(scope, number);
            let label = version.to_string();
            let definition = MigrationDefinition::new(format!("M{number}"), version, format!("migration {label}"));
            let log = log.clone();
            let failing_down = failing_down.clone();
            builder = builder.register(definition, move || {
                Box::new(Recording {
                    label: label.clone(),
                    number,
                    log: log.clone(),
                    fail_up,
                    failing_down: failing_down.clone(),
                })
            });
        }
        let locator = builder.build().unwrap();
        Fixture {
            log,
            failing_down,
            runner: MigrationRunner::new(db, locator),
        }
    }

    /// Memory store whose ledger rejects writes for one record id once armed.
    #[derive(Default)]
    struct BrokenLedger {
        inner: MemoryStore,
        broken_id: Mutex<Option<String>>,
    }

    impl BrokenLedger {
        fn arm(&self, id: &str) {
            *self.broken_id.lock().unwrap() = Some(id.to_string());
        }

        fn check(&self, collection: &str, id: &str) -> Result<(), StoreError> {
            if collection == crate::history::DEFAULT_LEDGER_COLLECTION
                && self.broken_id.lock().unwrap().as_deref() == Some(id)
            {
                return Err(StoreError::InvalidCollection {
                    name: collection.to_string(),
                    reason: "connection dropped",
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DocumentStore for BrokenLedger {
        async fn list_ids(&self, collection: &str) -> Result<Vec<String>, StoreError> {
            self.inner.list_ids(collection).await
        }

        async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
            self.inner.get(collection, id).await
        }

        async fn insert(&self, collection: &str, id: &str, document: &Document) -> Result<bool, StoreError> {
            self.check(collection, id)?;
            self.inner.insert(collection, id, document).await
        }

        async fn put(&self, collection: &str, id: &str, document: &Document) -> Result<(), StoreError> {
            self.inner.put(collection, id, document).await
        }

        async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
            self.check(collection, id)?;
            self.inner.delete(collection, id).await
        }

        async fn drop_collection(&self, collection: &str) -> Result<u64, StoreError> {
            self.inner.drop_collection(collection).await
        }
    }

    #[tokio::test]
    async fn up_applies_in_ascending_order() {
        let f = fixture(&[(None, 3, false), (None, 1, false), (None, 2, false)]);

        let report = f.runner.up(None, UpTarget::Latest).await.unwrap();
        assert!(report.is_done());
        assert_eq!(report.found, 3);
        assert_eq!(report.succeeded(), 3);
        assert_eq!(f.calls(), vec!["up #1", "up #2", "up #3"]);
        assert_eq!(f.applied(None).await, vec![1, 2, 3]);
        assert_eq!(report.documents_written(), 3);
    }

    #[tokio::test]
    async fn rerunning_up_is_a_no_op() {
        let f = fixture(&[(None, 1, false), (None, 2, false)]);
        f.runner.up(None, UpTarget::Latest).await.unwrap();
        f.calls();

        let report = f.runner.up(None, UpTarget::Latest).await.unwrap();
        assert!(report.is_done());
        assert_eq!(report.found, 0);
        assert!(f.calls().is_empty());
        assert_eq!(f.applied(None).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn up_honors_target_version() {
        let f = fixture(&[(None, 1, false), (None, 2, false), (None, 3, false)]);

        f.runner.up(None, UpTarget::Version(2)).await.unwrap();
        assert_eq!(f.applied(None).await, vec![1, 2]);

        f.runner.up(None, UpTarget::Latest).await.unwrap();
        assert_eq!(f.applied(None).await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn failure_halts_the_pass() {
        let f = fixture(&[(None, 1, false), (None, 2, true), (None, 3, false)]);

        let report = f.runner.up(None, UpTarget::Latest).await.unwrap();
        let fault = report.fault().expect("pass should halt");
        assert_eq!(fault.definition.version, MigrationVersion::global(2));
        assert!(matches!(fault.cause, MigrationError::Custom { .. }));
        assert_eq!(report.succeeded(), 1);
        assert_eq!(f.calls(), vec!["up #1", "up #2"]);
        assert_eq!(f.applied(None).await, vec![1]);
    }

    #[tokio::test]
    async fn halted_pass_resumes_where_it_stopped() {
        let log: CallLog = Arc::default();
        let db = Database::in_memory();
        let build = |fail: bool| {
            let mut builder = MigrationLocator::builder();
            for number in 1..=3 {
                let version = MigrationVersion::global(number);
                let label = version.to_string();
                let log = log.clone();
                builder = builder.register(
                    MigrationDefinition::new(format!("M{number}"), version, "resumable"),
                    move || {
                        Box::new(Recording {
                            label: label.clone(),
                            number,
                            log: log.clone(),
                            fail_up: fail && number == 2,
                            failing_down: Arc::default(),
                        })
                    },
                );
            }
            MigrationRunner::new(db.clone(), builder.build().unwrap())
        };

        let report = build(true).up(None, UpTarget::Latest).await.unwrap();
        assert!(!report.is_done());

        log.lock().unwrap().clear();
        let report = build(false).up(None, UpTarget::Latest).await.unwrap();
        assert!(report.is_done());
        assert_eq!(*log.lock().unwrap(), vec!["up #2", "up #3"]);
    }

    #[tokio::test]
    async fn scopes_are_isolated() {
        let f = fixture(&[
            (Some("users"), 1, false),
            (Some("users"), 2, false),
            (Some("posts"), 1, false),
            (None, 1, false),
        ]);

        let report = f.runner.up(Some("users"), UpTarget::Latest).await.unwrap();
        assert_eq!(report.succeeded(), 2);
        assert_eq!(f.calls(), vec!["up users#1", "up users#2"]);
        assert!(f.applied(Some("posts")).await.is_empty());

        f.runner.up(Some("posts"), UpTarget::Latest).await.unwrap();
        assert_eq!(f.calls(), vec!["up posts#1"]);
        assert_eq!(f.applied(Some("users")).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn down_rolls_back_in_descending_order() {
        let f = fixture(&[(None, 1, false), (None, 2, false), (None, 3, false)]);
        f.runner.up(None, UpTarget::Latest).await.unwrap();
        f.calls();

        let report = f.runner.down(None, DownTarget::Version(1)).await.unwrap();
        assert!(report.is_done());
        assert_eq!(report.direction, Direction::Down);
        assert_eq!(f.calls(), vec!["down #3", "down #2"]);
        assert_eq!(f.applied(None).await, vec![1]);

        f.runner.down(None, DownTarget::All).await.unwrap();
        assert_eq!(f.calls(), vec!["down #1"]);
        assert!(f.applied(None).await.is_empty());
    }

    #[tokio::test]
    async fn failing_down_halts_and_resumes() {
        let f = fixture(&[(None, 1, false), (None, 2, false), (None, 3, false)]);
        f.runner.up(None, UpTarget::Latest).await.unwrap();
        f.calls();
        *f.failing_down.lock().unwrap() = Some(2);

        let report = f.runner.down(None, DownTarget::All).await.unwrap();
        let fault = report.fault().expect("pass should halt");
        assert_eq!(fault.definition.version, MigrationVersion::global(2));
        assert_eq!(fault.cause.to_string(), "cannot undo");
        assert_eq!(report.found, 3);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(f.calls(), vec!["down #3", "down #2"]);
        assert_eq!(f.applied(None).await, vec![1, 2]);

        *f.failing_down.lock().unwrap() = None;
        let report = f.runner.down(None, DownTarget::All).await.unwrap();
        assert!(report.is_done());
        assert_eq!(f.calls(), vec!["down #2", "down #1"]);
        assert!(f.applied(None).await.is_empty());
    }

    #[tokio::test]
    async fn failed_ledger_insert_names_the_unrecorded_version() {
        let store = Arc::new(BrokenLedger::default());
        store.arm("g.2");
        let db = Database::from_arc(store);
        let f = fixture_on(db.clone(), &[(None, 1, false), (None, 2, false), (None, 3, false)]);

        let err = f.runner.up(None, UpTarget::Latest).await.unwrap_err();
        match &err {
            EngineError::LedgerWrite {
                direction,
                version,
                completed,
                source,
            } => {
                assert_eq!(*direction, Direction::Up);
                assert_eq!(*version, MigrationVersion::global(2));
                assert_eq!(*completed, vec![MigrationVersion::global(1)]);
                assert!(matches!(source, LedgerError::Store(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("#2"));

        // #2's data changed, #3 never ran.
        assert_eq!(f.calls(), vec!["up #1", "up #2"]);
        assert_eq!(db.collection("touched").ids().await.unwrap(), vec!["n1", "n2"]);
        assert_eq!(f.applied(None).await, vec![1]);
    }

    #[tokio::test]
    async fn failed_ledger_delete_names_the_version_still_recorded() {
        let store = Arc::new(BrokenLedger::default());
        let f = fixture_on(
            Database::from_arc(store.clone()),
            &[(None, 1, false), (None, 2, false), (None, 3, false)],
        );
        f.runner.up(None, UpTarget::Latest).await.unwrap();
        f.calls();
        store.arm("g.2");

        let err = f.runner.down(None, DownTarget::All).await.unwrap_err();
        let EngineError::LedgerWrite {
            direction,
            version,
            completed,
            ..
        } = err
        else {
            panic!("expected a ledger write failure");
        };
        assert_eq!(direction, Direction::Down);
        assert_eq!(version, MigrationVersion::global(2));
        assert_eq!(completed, vec![MigrationVersion::global(3)]);
        assert_eq!(f.calls(), vec!["down #3", "down #2"]);
        assert_eq!(f.applied(None).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn down_skips_versions_that_were_never_applied() {
        let f = fixture(&[(None, 1, false), (None, 2, false), (None, 3, false)]);
        f.runner.up(None, UpTarget::Version(2)).await.unwrap();
        f.calls();

        f.runner.down(None, DownTarget::All).await.unwrap();
        assert_eq!(f.calls(), vec!["down #2", "down #1"]);
    }

    #[tokio::test]
    async fn up_then_down_restores_the_ledger() {
        let f = fixture(&[(Some("users"), 1, false), (Some("users"), 2, false)]);
        f.runner.up(Some("users"), UpTarget::Latest).await.unwrap();
        f.runner.down(Some("users"), DownTarget::All).await.unwrap();
        assert!(f.applied(None).await.is_empty());
    }

    #[tokio::test]
    async fn status_reports_applied_pending_and_orphaned() {
        let f = fixture(&[(None, 1, false), (None, 2, false)]);
        f.runner.up(None, UpTarget::Version(1)).await.unwrap();
        f.runner
            .history()
            .record_applied(&MigrationVersion::global(7), "removed from build")
            .await
            .unwrap();

        let statuses = f.runner.status(None).await.unwrap();
        assert_eq!(statuses.len(), 3);
        assert!(matches!(statuses[0].state, MigrationState::Applied { .. }));
        assert_eq!(statuses[1].state, MigrationState::Pending);
        assert!(matches!(statuses[2].state, MigrationState::Orphaned { .. }));
        assert_eq!(statuses[2].type_name, None);
    }

    #[tokio::test]
    async fn resolve_rewrites_the_ledger_without_running() {
        let f = fixture(&[(None, 1, false)]);
        let v1 = MigrationVersion::global(1);

        let changed = f
            .runner
            .resolve(&v1, Resolution::Applied { description: None })
            .await
            .unwrap();
        assert!(changed);
        assert!(f.calls().is_empty());
        let records = f.runner.history().records(None).await.unwrap();
        assert_eq!(records[0].description, "migration #1");

        let again = f
            .runner
            .resolve(&v1, Resolution::Applied { description: None })
            .await
            .unwrap();
        assert!(!again);

        assert!(f.runner.resolve(&v1, Resolution::RolledBack).await.unwrap());
        assert!(!f.runner.resolve(&v1, Resolution::RolledBack).await.unwrap());
    }

    #[tokio::test]
    async fn stale_ledger_is_an_engine_error() {
        let f = fixture(&[(None, 1, false)]);
        f.runner.up(None, UpTarget::Latest).await.unwrap();
        let err = f
            .runner
            .history()
            .record_applied(&MigrationVersion::global(1), "again")
            .await
            .unwrap_err();
        let err: EngineError = err.into();
        assert!(matches!(err, EngineError::Ledger(LedgerError::AlreadyApplied(_))));
    }

    #[tokio::test]
    async fn custom_ledger_collection_is_used() {
        let f = fixture(&[(None, 1, false)]);
        let runner = MigrationRunner::new(f.runner.database().clone(), f.runner.locator().clone())
            .with_ledger_collection("schema_history");
        runner.up(None, UpTarget::Latest).await.unwrap();

        let ids = runner.database().collection("schema_history").ids().await.unwrap();
        assert_eq!(ids, vec!["g.1"]);
        assert!(f.applied(None).await.is_empty());
    }
}
