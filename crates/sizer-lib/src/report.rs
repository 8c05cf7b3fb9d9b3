//! Report rendering
//!
//! Every result type lists its fields once, through [`Report::rows`] for the
//! table and its serde derive for JSON. A [`Formatter`] turns any report into
//! text.

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::error::Result;

/// One line of the two-column report table
#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub struct ReportRow {
    #[tabled(rename = "Setting")]
    pub setting: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl ReportRow {
    pub fn new(setting: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            setting: setting.into(),
            value: value.into(),
        }
    }
}

/// Generated server configuration printed after the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnippet {
    pub title: String,
    pub body: String,
}

impl ConfigSnippet {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// A result that can be rendered as a table or serialized
pub trait Report: Serialize {
    fn title(&self) -> String;

    fn rows(&self) -> Vec<ReportRow>;

    fn warnings(&self) -> Vec<String> {
        Vec::new()
    }

    fn config_snippet(&self) -> Option<ConfigSnippet> {
        None
    }
}

/// Renders a [`Report`] to text
pub trait Formatter {
    fn render<R: Report>(&self, report: &R) -> Result<String>;
}

/// Two-column table followed by warnings and the config snippet
#[derive(Debug, Clone, Copy, Default)]
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn render<R: Report>(&self, report: &R) -> Result<String> {
        let title = report.title();
        let mut out = format!("{}\n{}\n", title, "=".repeat(title.chars().count()));

        let table = Table::new(report.rows()).with(Style::rounded()).to_string();
        out.push_str(&table);
        out.push('\n');

        for warning in report.warnings() {
            out.push_str(&format!("\n⚠ {}", warning));
        }
        if !report.warnings().is_empty() {
            out.push('\n');
        }

        if let Some(snippet) = report.config_snippet() {
            out.push_str(&format!("\n{}:\n---\n{}", snippet.title, snippet.body));
        }

        Ok(out)
    }
}

/// Pretty-printed JSON of the result record
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn render<R: Report>(&self, report: &R) -> Result<String> {
        let mut json = serde_json::to_string_pretty(report)?;
        json.push('\n');
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        workers: u64,
        #[serde(skip)]
        warn: bool,
    }

    impl Report for Sample {
        fn title(&self) -> String {
            "Sample".to_string()
        }

        fn rows(&self) -> Vec<ReportRow> {
            vec![ReportRow::new("Workers", self.workers.to_string())]
        }

        fn warnings(&self) -> Vec<String> {
            if self.warn {
                vec!["low capacity".to_string()]
            } else {
                Vec::new()
            }
        }

        fn config_snippet(&self) -> Option<ConfigSnippet> {
            Some(ConfigSnippet::new("Snippet", format!("workers = {}\n", self.workers)))
        }
    }

    #[test]
    fn test_table_contains_rows_and_snippet() {
        let out = TableFormatter.render(&Sample { workers: 4, warn: false }).unwrap();
        assert!(out.starts_with("Sample\n======\n"));
        assert!(out.contains("Setting"));
        assert!(out.contains("Workers"));
        assert!(out.contains("Snippet:\n---\nworkers = 4\n"));
        assert!(!out.contains('⚠'));
    }

    #[test]
    fn test_table_lists_warnings() {
        let out = TableFormatter.render(&Sample { workers: 0, warn: true }).unwrap();
        assert!(out.contains("⚠ low capacity"));
    }

    #[test]
    fn test_json_is_the_record() {
        let out = JsonFormatter.render(&Sample { workers: 4, warn: true }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value, serde_json::json!({ "workers": 4 }));
    }
}
