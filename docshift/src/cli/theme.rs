//! Terminal colors and glyphs shared by command output and help text.

use clap::builder::styling::{AnsiColor, Style, Styles};
use colored::{Color, Colorize, control::ShouldColorize};
use once_cell::sync::Lazy;

/// Whether stdout should get ANSI colors, decided once from `NO_COLOR`/`CLICOLOR` and the tty.
pub static COLOR_SUPPORTED: Lazy<bool> = Lazy::new(|| ShouldColorize::from_env().should_colorize());

/// The role a piece of terminal text plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Failure,
    Caution,
    Note,
    Heading,
    Accent,
    Muted,
    Command,
    Key,
    Value,
}

impl Tone {
    fn ansi(self) -> AnsiColor {
        match self {
            Tone::Success => AnsiColor::Green,
            Tone::Failure => AnsiColor::Red,
            Tone::Caution => AnsiColor::Yellow,
            Tone::Note => AnsiColor::Blue,
            Tone::Heading => AnsiColor::BrightBlue,
            Tone::Accent => AnsiColor::Cyan,
            Tone::Muted => AnsiColor::BrightBlack,
            Tone::Command => AnsiColor::Magenta,
            Tone::Key => AnsiColor::BrightCyan,
            Tone::Value => AnsiColor::White,
        }
    }

    pub fn color(self) -> Color {
        match self.ansi() {
            AnsiColor::Green => Color::Green,
            AnsiColor::Red => Color::Red,
            AnsiColor::Yellow => Color::Yellow,
            AnsiColor::Blue => Color::Blue,
            AnsiColor::BrightBlue => Color::BrightBlue,
            AnsiColor::Cyan => Color::Cyan,
            AnsiColor::BrightBlack => Color::BrightBlack,
            AnsiColor::Magenta => Color::Magenta,
            AnsiColor::BrightCyan => Color::BrightCyan,
            _ => Color::White,
        }
    }

    fn style(self) -> Style {
        Style::new().fg_color(Some(self.ansi().into()))
    }

    /// `text` in this tone, or unchanged when `use_color` is off.
    pub fn paint(self, text: &str, bold: bool, use_color: bool) -> String {
        if !use_color {
            return text.to_string();
        }
        let styled = text.color(self.color());
        if bold { styled.bold().to_string() } else { styled.to_string() }
    }
}

/// Clap help styles built from the same tones as command output.
pub fn help_styles() -> Styles {
    Styles::styled()
        .usage(Tone::Heading.style().bold())
        .header(Tone::Accent.style().bold())
        .literal(Tone::Command.style())
        .placeholder(Tone::Muted.style())
        .valid(Tone::Success.style())
        .invalid(Tone::Caution.style())
        .error(Tone::Failure.style().bold())
}

pub mod glyph {
    pub const OK: &str = "✓";
    pub const FAILED: &str = "✗";
    pub const CAUTION: &str = "⚠";
    pub const NOTE: &str = "ℹ";
    pub const ARROW: &str = "→";
    pub const BULLET: &str = "•";
    pub const WAIT: &str = "⟳";
    pub const UP: &str = "↑";
    pub const DOWN: &str = "↓";
    pub const PENDING: &str = "○";
    pub const ORPHANED: &str = "?";
}
