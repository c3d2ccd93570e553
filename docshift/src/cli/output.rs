use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use serde::Serialize;
use std::io::Write;

use super::theme::{Tone, glyph};

/// Output format options for CLI commands
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
    /// Compact single-line output
    Compact,
}

/// Global CLI options that affect output and behavior
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

/// Data that can be rendered as a table or a single line
pub trait TableDisplay {
    fn to_table(&self, options: &GlobalOptions) -> Table;
    fn to_compact(&self) -> String;
}

/// Output manager handles formatting and display
pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    /// Whether human-oriented messages should be printed at all
    fn chatty(&self) -> bool {
        !self.options.quiet && self.options.output_format != OutputFormat::Json
    }

    /// Display data according to the configured output format
    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }

        match self.options.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                println!("{json}");
            }
            OutputFormat::Table => {
                let table = data.to_table(&self.options);
                println!("{table}");
            }
            OutputFormat::Compact => {
                println!("{}", data.to_compact());
            }
        }
        Ok(())
    }

    /// Display a success message with color and icon
    pub fn success(&self, message: &str) {
        if self.chatty() {
            println!("{}", self.decorate(glyph::OK, message, Tone::Success));
        }
    }

    /// Display an error message with color and icon
    pub fn error(&self, message: &str) {
        eprintln!("{}", self.decorate(glyph::FAILED, message, Tone::Failure));
    }

    /// Display a warning message
    pub fn warning(&self, message: &str) {
        if self.chatty() {
            println!("{}", self.decorate(glyph::CAUTION, message, Tone::Caution));
        }
    }

    /// Display verbose information (only if verbose mode is enabled)
    pub fn verbose(&self, message: &str) {
        if self.options.verbose && !self.options.quiet {
            eprintln!("{}", self.decorate(glyph::ARROW, message, Tone::Muted));
        }
    }

    /// Display info message with color and icon
    pub fn info(&self, message: &str) {
        if self.chatty() {
            println!("{}", self.decorate(glyph::NOTE, message, Tone::Note));
        }
    }

    /// Display a heading
    pub fn heading(&self, text: &str) {
        if self.chatty() {
            let output = if self.options.no_color {
                format!("\n{text}\n{}", "=".repeat(text.chars().count()))
            } else {
                format!("\n{}", text.color(Tone::Heading.color()).bold())
            };
            println!("{output}");
        }
    }

    /// Display a key-value pair
    pub fn key_value(&self, key: &str, value: &str) {
        if self.chatty() {
            let output = if self.options.no_color {
                format!("{key}: {value}")
            } else {
                format!("{}: {}", key.color(Tone::Key.color()).bold(), value.color(Tone::Value.color()))
            };
            println!("{output}");
        }
    }

    /// Display a bullet list item
    pub fn bullet(&self, text: &str) {
        if self.chatty() {
            let output = if self.options.no_color {
                format!("  {} {text}", glyph::BULLET)
            } else {
                format!("  {} {text}", glyph::BULLET.color(Tone::Muted.color()))
            };
            println!("{output}");
        }
    }

    /// Display progress indicator
    pub fn progress(&self, message: &str) {
        if !self.chatty() {
            return;
        }

        let output = if self.options.no_color {
            format!("{} {message}...", glyph::WAIT)
        } else {
            format!(
                "{} {}...",
                glyph::WAIT.color(Tone::Accent.color()).bold(),
                message.color(Tone::Accent.color())
            )
        };

        print!("\r{output}");
        std::io::stdout().flush().ok();
    }

    /// Clear the current line (useful after progress indicators)
    pub fn clear_line(&self) {
        if !self.chatty() {
            return;
        }

        print!("\r{}", " ".repeat(80));
        print!("\r");
        std::io::stdout().flush().ok();
    }

    fn decorate(&self, icon: &str, message: &str, tone: Tone) -> String {
        let use_color = !self.options.no_color;
        format!("{} {}", tone.paint(icon, false, use_color), tone.paint(message, false, use_color))
    }
}

/// Create a themed table
pub fn create_table(options: &GlobalOptions) -> Table {
    let mut table = Table::new();

    if !options.no_color {
        table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
    } else {
        table.load_preset(comfy_table::presets::ASCII_FULL);
    }

    table
}

/// Add themed header to table
pub fn add_table_header(table: &mut Table, options: &GlobalOptions, headers: &[&str]) {
    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| {
            let cell = Cell::new(h).add_attribute(Attribute::Bold);
            if options.no_color { cell } else { cell.fg(TableColor::Cyan) }
        })
        .collect();
    table.set_header(header_cells);
}
