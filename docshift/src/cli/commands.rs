use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Table};
use serde::Serialize;

use super::examples::ExampleGroup;
use super::output::{GlobalOptions, OutputManager, TableDisplay, add_table_header, create_table};
use super::theme::glyph;
use crate::errors::EngineError;
use crate::runner::{
    Direction, ExecutedMigration, MigrationRunner, MigrationState, MigrationStatus, Resolution, RunOutcome, RunReport,
};
use crate::version::{DownTarget, MigrationVersion, UpTarget};

pub const UP_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Apply Migrations",
    commands: &[
        "docshift up                            # Apply every pending global migration",
        "docshift up --version 5                # Apply global migrations up to 5",
        "docshift up --collection users         # Apply pending migrations scoped to 'users'",
    ],
}];

pub const DOWN_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Roll Back Migrations",
    commands: &[
        "docshift down --version 3              # Roll back everything above 3",
        "docshift down --collection users       # Roll back every 'users' migration",
    ],
}];

pub const STATUS_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Inspect",
    commands: &[
        "docshift status                        # Every scope",
        "docshift status --collection users     # One scope",
        "docshift --output json status          # For scripting",
    ],
}];

pub const RESOLVE_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Recovery",
    commands: &[
        "docshift resolve --version 4 --applied                     # Mark as applied",
        "docshift resolve --version 4 --collection users --rolled-back",
    ],
}];

#[derive(Subcommand)]
pub enum Commands {
    /// Apply pending migrations in ascending order
    Up(UpArgs),

    /// Roll back applied migrations in descending order
    Down(DownArgs),

    /// Show applied, pending and orphaned migrations
    Status(StatusArgs),

    /// Manually mark a migration as applied or rolled back without running it
    Resolve(ResolveArgs),
}

#[derive(Args)]
pub struct UpArgs {
    /// Collection scope; omit for global migrations
    #[arg(short, long)]
    pub collection: Option<String>,

    /// Highest version to apply (default: latest)
    #[arg(long, allow_negative_numbers = true)]
    pub version: Option<i64>,
}

#[derive(Args)]
pub struct DownArgs {
    /// Collection scope; omit for global migrations
    #[arg(short, long)]
    pub collection: Option<String>,

    /// Version to leave applied; everything above it is rolled back (default: all)
    #[arg(long, allow_negative_numbers = true)]
    pub version: Option<i64>,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Only show one collection scope
    #[arg(short, long)]
    pub collection: Option<String>,

    /// Only show global migrations
    #[arg(long, conflicts_with = "collection")]
    pub global: bool,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Version number to resolve
    #[arg(long, allow_negative_numbers = true)]
    pub version: i64,

    /// Collection scope; omit for a global migration
    #[arg(short, long)]
    pub collection: Option<String>,

    /// Mark the migration as applied
    #[arg(long, conflicts_with = "rolled_back")]
    pub applied: bool,

    /// Mark the migration as rolled back
    #[arg(long, conflicts_with = "applied")]
    pub rolled_back: bool,

    /// Ledger description when marking applied (default: the discovered description)
    #[arg(long, requires = "applied")]
    pub description: Option<String>,
}

/// How a command finished, mapped onto the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    Halted,
}

impl CommandStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            CommandStatus::Success => 0,
            CommandStatus::Halted => 2,
        }
    }
}

pub async fn handle_command(
    command: Commands,
    runner: &MigrationRunner,
    output: &OutputManager,
) -> Result<CommandStatus> {
    match command {
        Commands::Up(args) => handle_up(runner, args, output).await,
        Commands::Down(args) => handle_down(runner, args, output).await,
        Commands::Status(args) => handle_status(runner, args, output).await,
        Commands::Resolve(args) => handle_resolve(runner, args, output).await,
    }
}

async fn handle_up(runner: &MigrationRunner, args: UpArgs, output: &OutputManager) -> Result<CommandStatus> {
    let scope = args.collection.as_deref();
    output.heading("Apply Migrations");
    output.key_value("Scope", &scope_name(scope));
    output.bullet(&format!("Ledger collection: {}", runner.history().collection_name()));

    let report = runner
        .up(scope, UpTarget::from(args.version))
        .await
        .map_err(|err| explain_ledger_write(err, output))?;
    report_run(&report, output)
}

async fn handle_down(runner: &MigrationRunner, args: DownArgs, output: &OutputManager) -> Result<CommandStatus> {
    let scope = args.collection.as_deref();
    output.heading("Roll Back Migrations");
    output.key_value("Scope", &scope_name(scope));
    output.bullet(&format!("Ledger collection: {}", runner.history().collection_name()));

    let report = runner
        .down(scope, DownTarget::from(args.version))
        .await
        .map_err(|err| explain_ledger_write(err, output))?;
    report_run(&report, output)
}

fn report_run(report: &RunReport, output: &OutputManager) -> Result<CommandStatus> {
    for executed in &report.executed {
        output.verbose(&format!(
            "{} {} ({}ms, {} write(s))",
            report.direction, executed.definition, executed.execution_time_ms, executed.documents_written
        ));
    }

    let summary = RunSummary::from(report);
    output.display(&summary)?;

    match &report.outcome {
        RunOutcome::Done => {
            if report.found == 0 {
                output.success("Nothing to do");
            } else {
                output.success(&format!(
                    "{} migration(s) {} in {}ms",
                    report.succeeded(),
                    past_tense(report.direction),
                    report.total_time_ms
                ));
            }
            Ok(CommandStatus::Success)
        }
        RunOutcome::Halted(fault) => {
            output.error(&format!("Halted at {}: {}", fault.definition, fault.cause));
            output.info("Earlier migrations in this pass remain recorded; fix the fault and re-run to resume.");
            Ok(CommandStatus::Halted)
        }
    }
}

/// Points the operator at `resolve` when a migration ran but its ledger update failed.
fn explain_ledger_write(err: EngineError, output: &OutputManager) -> anyhow::Error {
    if let EngineError::LedgerWrite {
        direction,
        version,
        completed,
        ..
    } = &err
    {
        if !completed.is_empty() {
            let recorded: Vec<String> = completed.iter().map(ToString::to_string).collect();
            output.info(&format!("Recorded before the failure: {}", recorded.join(", ")));
        }
        output.warning(&format!(
            "Migration {version} was {} but the ledger does not show it",
            past_tense(*direction)
        ));
        output.info(&format!("Once the store is reachable, run: {}", resolve_hint(*direction, version)));
    }
    err.into()
}

fn resolve_hint(direction: Direction, version: &MigrationVersion) -> String {
    let mut hint = format!("docshift resolve --version {}", version.number);
    if let Some(scope) = version.scope() {
        hint.push_str(&format!(" --collection {scope}"));
    }
    hint.push_str(match direction {
        Direction::Up => " --applied",
        Direction::Down => " --rolled-back",
    });
    hint
}

async fn handle_status(runner: &MigrationRunner, args: StatusArgs, output: &OutputManager) -> Result<CommandStatus> {
    let statuses = runner.status(args.collection.as_deref()).await?;
    let statuses = if args.global {
        statuses.into_iter().filter(|s| s.version.scope().is_none()).collect()
    } else {
        statuses
    };

    let view = StatusView(statuses);
    output.display(&view)?;

    let orphaned = view.count(|s| matches!(s, MigrationState::Orphaned { .. }));
    if orphaned > 0 {
        output.warning(&format!("{orphaned} ledger record(s) have no matching migration in this build"));
    }
    Ok(CommandStatus::Success)
}

async fn handle_resolve(runner: &MigrationRunner, args: ResolveArgs, output: &OutputManager) -> Result<CommandStatus> {
    if !args.applied && !args.rolled_back {
        output.error("Must specify either --applied or --rolled-back");
        bail!("Missing resolution flag");
    }

    let version = MigrationVersion::new(args.collection.as_deref(), args.version);
    let resolution = if args.applied {
        Resolution::Applied {
            description: args.description,
        }
    } else {
        Resolution::RolledBack
    };
    let label = if args.applied { "applied" } else { "rolled back" };

    output.heading(&format!("Resolve Migration: {version}"));
    if runner.locator().get(&version).is_none() {
        output.warning(&format!("No migration {version} is registered in this build"));
    }

    if runner.resolve(&version, resolution).await? {
        output.success(&format!("Marked {version} as {label}"));
    } else {
        output.warning(&format!("Migration {version} is already marked as {label}"));
    }
    Ok(CommandStatus::Success)
}

fn scope_name(scope: Option<&str>) -> String {
    scope.map_or_else(|| "global".to_string(), str::to_string)
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn past_tense(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "applied",
        Direction::Down => "rolled back",
    }
}

/// Serializable projection of a [`RunReport`].
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub direction: Direction,
    pub scope: Option<String>,
    pub found: usize,
    pub succeeded: usize,
    pub executed: Vec<ExecutedMigration>,
    pub halted: Option<HaltSummary>,
    pub total_time_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct HaltSummary {
    pub version: MigrationVersion,
    pub description: String,
    pub type_name: String,
    pub cause: String,
}

impl From<&RunReport> for RunSummary {
    fn from(report: &RunReport) -> Self {
        Self {
            direction: report.direction,
            scope: report.scope.clone(),
            found: report.found,
            succeeded: report.succeeded(),
            executed: report.executed.clone(),
            halted: report.fault().map(|fault| HaltSummary {
                version: fault.definition.version.clone(),
                description: fault.definition.description.clone(),
                type_name: fault.definition.type_name.clone(),
                cause: fault.cause.to_string(),
            }),
            total_time_ms: report.total_time_ms,
        }
    }
}

impl TableDisplay for RunSummary {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = create_table(options);
        add_table_header(&mut table, options, &["", "Version", "Description", "Time", "Writes"]);

        let icon = match self.direction {
            Direction::Up => glyph::UP,
            Direction::Down => glyph::DOWN,
        };
        for executed in &self.executed {
            table.add_row(vec![
                Cell::new(icon),
                Cell::new(&executed.definition.version),
                Cell::new(&executed.definition.description),
                Cell::new(format!("{}ms", executed.execution_time_ms)),
                Cell::new(executed.documents_written),
            ]);
        }
        if let Some(halted) = &self.halted {
            table.add_row(vec![
                Cell::new(glyph::FAILED),
                Cell::new(&halted.version),
                Cell::new(format!("{} ({})", halted.description, halted.cause)),
                Cell::new("-"),
                Cell::new("-"),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        let mut line = format!(
            "{} scope={} found={} succeeded={} time={}ms",
            self.direction,
            scope_name(self.scope.as_deref()),
            self.found,
            self.succeeded,
            self.total_time_ms
        );
        if let Some(halted) = &self.halted {
            line.push_str(&format!(" halted={}", halted.version));
        }
        line
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct StatusView(pub Vec<MigrationStatus>);

impl StatusView {
    fn count(&self, predicate: impl Fn(&MigrationState) -> bool) -> usize {
        self.0.iter().filter(|s| predicate(&s.state)).count()
    }
}

impl TableDisplay for StatusView {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = create_table(options);
        add_table_header(&mut table, options, &["", "Version", "Description", "Type", "Applied At"]);

        if self.0.is_empty() {
            table.add_row(vec![Cell::new(""), Cell::new("No migrations found")]);
            return table;
        }

        for status in &self.0 {
            let (icon, applied_at) = match &status.state {
                MigrationState::Applied { applied_at } => (glyph::OK, format_datetime(applied_at)),
                MigrationState::Pending => (glyph::PENDING, "pending".to_string()),
                MigrationState::Orphaned { applied_at } => (glyph::ORPHANED, format_datetime(applied_at)),
            };
            table.add_row(vec![
                Cell::new(icon),
                Cell::new(&status.version),
                Cell::new(&status.description),
                Cell::new(status.type_name.as_deref().unwrap_or("(not in build)")),
                Cell::new(applied_at),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!(
            "applied={} pending={} orphaned={}",
            self.count(|s| matches!(s, MigrationState::Applied { .. })),
            self.count(|s| matches!(s, MigrationState::Pending)),
            self.count(|s| matches!(s, MigrationState::Orphaned { .. }))
        )
    }
}
