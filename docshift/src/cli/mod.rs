//! The `docshift` command line.
//!
//! The stock binary only sees migrations linked into it. Applications that keep their
//! migrations in their own crate call [`run`] from a small binary of their own, which links
//! their `#[migration]` types into the inventory.

mod commands;
mod examples;
mod output;
mod theme;

use anyhow::{Context, Result};
use clap::{ColorChoice, Command, CommandFactory, FromArgMatches, Parser};
use std::fmt::Write;
use std::io;

use crate::config::ProjectContext;
use crate::locator::MigrationLocator;
use crate::runner::MigrationRunner;
use crate::store::Database;
use commands::{CommandStatus, Commands, handle_command};
use examples::{ExampleGroup, command_examples};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::{COLOR_SUPPORTED, Tone, glyph, help_styles};

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("REDIS_URL", "Redis connection URL (overrides .docshift/config.toml)"),
    ("RUST_LOG", "Log filter for engine diagnostics, e.g. docshift=debug"),
];

/// Exit code for discovery, configuration, connection and ledger failures.
const FAILURE_EXIT_CODE: i32 = 1;

#[derive(Parser)]
#[command(name = "docshift")]
#[command(version)]
#[command(
    about = "Versioned migrations for document databases",
    long_about = r#"Versioned, reversible migrations for RedisJSON document stores.

Migrations are ordered by (collection scope, number) and recorded in a ledger
collection next to the data. A pass stops at the first failing migration and
keeps everything applied before it.

Commands:
  up        Apply pending migrations
  down      Roll back applied migrations
  status    Show applied, pending and orphaned migrations
  resolve   Mark a migration applied or rolled back without running it
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", global = true, hide_env_values = true)]
    redis_url: Option<String>,

    /// Key prefix documents are stored under
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Collection holding the migration ledger
    #[arg(long, global = true)]
    ledger_collection: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn parse_with_styles() -> Self {
        let matches = build_cli_command()
            .styles(help_styles())
            .try_get_matches()
            .unwrap_or_else(|err| exit_framed(err));
        Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
    }

    fn global_options(&self) -> GlobalOptions {
        GlobalOptions {
            output_format: self.output.clone(),
            quiet: self.quiet,
            verbose: self.verbose,
            no_color: self.no_color || !*COLOR_SUPPORTED,
        }
    }
}

/// Parses the process arguments, runs the command against every migration registered in the
/// inventory, and returns the process exit code.
pub async fn run() -> i32 {
    run_with(None).await
}

/// Like [`run`], but against an explicitly built set of migrations.
pub async fn run_with_locator(locator: MigrationLocator) -> i32 {
    run_with(Some(locator)).await
}

async fn run_with(locator: Option<MigrationLocator>) -> i32 {
    let cli = Cli::parse_with_styles();
    let output = OutputManager::new(cli.global_options());
    if output.options.no_color {
        colored::control::set_override(false);
    }

    println!();

    let code = match execute(cli, locator, &output).await {
        Ok(status) => status.exit_code(),
        Err(err) => {
            output.error(&format!("{err:#}"));
            FAILURE_EXIT_CODE
        }
    };

    println!();
    code
}

async fn execute(cli: Cli, locator: Option<MigrationLocator>, output: &OutputManager) -> Result<CommandStatus> {
    let ctx = ProjectContext::find()?;
    if ctx.has_config_file() {
        output.verbose(&format!("Config: {}", ctx.config_path.display()));
    }

    let locator = match locator {
        Some(locator) => locator,
        None => MigrationLocator::discover().context("Migration discovery failed")?,
    };
    output.verbose(&format!("{} migration(s) registered", locator.len()));

    let redis_url = match cli.redis_url {
        Some(url) => url,
        None => ctx.redis_url().context("No Redis URL configured; set REDIS_URL or pass --redis-url")?,
    };
    let prefix = cli.prefix.unwrap_or_else(|| ctx.prefix().to_string());
    let ledger_collection = cli
        .ledger_collection
        .unwrap_or_else(|| ctx.ledger_collection().to_string());

    output.progress("Connecting to Redis");
    let db = Database::connect_redis(&redis_url, prefix.as_str())
        .await
        .context("Failed to connect to Redis")?;
    output.clear_line();
    output.verbose(&format!("Connected to Redis (prefix '{prefix}', ledger '{ledger_collection}')"));

    let runner = MigrationRunner::new(db, locator).with_ledger_collection(ledger_collection);
    handle_command(cli.command, &runner, output).await
}

/// Prints a clap error, help or version page between blank lines and exits with clap's code.
fn exit_framed(err: clap::Error) -> ! {
    let blank = || {
        if err.use_stderr() {
            eprintln!();
        } else {
            println!();
        }
    };
    blank();
    if let Err(print_err) = err.print()
        && print_err.kind() != io::ErrorKind::BrokenPipe
    {
        eprintln!("Failed to display help: {print_err}");
    }
    blank();
    std::process::exit(err.exit_code());
}

fn build_cli_command() -> Command {
    let use_color = *COLOR_SUPPORTED;
    let appendix = render_top_level_appendix(use_color);
    let mut command = Cli::command().after_long_help(appendix);
    command = command.color(if use_color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    });
    attach_command_examples(&mut command, use_color);
    command
}

fn attach_command_examples(command: &mut Command, use_color: bool) {
    for example in command_examples() {
        if let Some(subcommand) = command.find_subcommand_mut(example.name) {
            let help_text = render_examples(example.groups, use_color);
            *subcommand = subcommand.clone().after_long_help(help_text);
        }
    }
}

fn render_examples(groups: &[ExampleGroup], use_color: bool) -> String {
    let mut buffer = String::new();

    let heading = Tone::Accent.paint("Examples:", true, use_color);
    let _ = writeln!(buffer, "{heading}");

    for (index, group) in groups.iter().enumerate() {
        let title = Tone::Heading.paint(group.title, true, use_color);
        let _ = writeln!(buffer, "  {title}");

        for command in group.commands {
            let arrow = Tone::Command.paint(glyph::ARROW, false, use_color);
            let command_text = Tone::Command.paint(command, false, use_color);
            let _ = writeln!(buffer, "    {arrow} {command_text}");
        }

        if index + 1 < groups.len() {
            buffer.push('\n');
        }
    }

    buffer
}

fn render_top_level_appendix(use_color: bool) -> String {
    let mut buffer = String::new();

    let env_heading = Tone::Accent.paint("Environment Variables:", true, use_color);
    let _ = writeln!(buffer, "{env_heading}");
    for (key, description) in ENVIRONMENT_VARIABLES {
        let key_text = Tone::Key.paint(key, true, use_color);
        let value_text = Tone::Value.paint(description, false, use_color);
        let _ = writeln!(buffer, "  {key_text}  {value_text}");
    }

    buffer.push('\n');

    let exit_heading = Tone::Accent.paint("Exit Codes:", true, use_color);
    let _ = writeln!(buffer, "{exit_heading}");
    for (code, meaning) in [
        ("0", "every selected migration completed"),
        ("1", "discovery, configuration, connection or ledger failure"),
        ("2", "a migration failed and the pass halted"),
    ] {
        let code_text = Tone::Key.paint(code, true, use_color);
        let meaning_text = Tone::Value.paint(meaning, false, use_color);
        let _ = writeln!(buffer, "  {code_text}  {meaning_text}");
    }

    buffer.push('\n');

    let tip_heading = Tone::Accent.paint("Tip:", true, use_color);
    let tip_text = Tone::Command.paint(
        "Use 'docshift <command> --help' to view examples for each command.",
        false,
        use_color,
    );
    let _ = writeln!(buffer, "{tip_heading} {tip_text}");

    buffer
}
