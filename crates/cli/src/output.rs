//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use sizer_lib::{Formatter, JsonFormatter, Report, TableFormatter};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn render<R: Report>(self, report: &R) -> sizer_lib::Result<String> {
        match self {
            Self::Table => TableFormatter.render(report),
            Self::Json => JsonFormatter.render(report),
        }
    }
}

/// Print a report to stdout in the selected format
pub fn print_report<R: Report>(report: &R, format: OutputFormat) -> Result<()> {
    print!("{}", format.render(report)?);
    Ok(())
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}
