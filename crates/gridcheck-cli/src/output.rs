//! Output formatting for the CLI.

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use gridcheck_core::report::{RunReport, ScenarioOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable tables
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Items that can be shown as a table row.
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn render_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut table = table();
            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }
            table.to_string()
        }
        OutputFormat::Json => serde_json::to_string_pretty(items).unwrap_or_default(),
    }
}

pub fn render_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => T::headers()
            .iter()
            .zip(item.row())
            .map(|(header, value)| format!("{header}: {value}"))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Json => serde_json::to_string_pretty(item).unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ScenarioRow {
    pub name: &'static str,
    pub description: &'static str,
}

impl TableDisplay for ScenarioRow {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Checks"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.name.to_string(), self.description.to_string()]
    }
}

#[derive(Debug, Serialize)]
pub struct StatusRow {
    pub endpoint: String,
    pub reachable: bool,
}

impl TableDisplay for StatusRow {
    fn headers() -> Vec<&'static str> {
        vec!["Endpoint", "Reachable"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.endpoint.clone(), if self.reachable { "yes" } else { "no" }.to_string()]
    }
}

#[derive(Debug, Serialize)]
pub struct ProbeRow {
    pub endpoint: String,
    pub state: String,
}

impl TableDisplay for ProbeRow {
    fn headers() -> Vec<&'static str> {
        vec!["Endpoint", "State"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.endpoint.clone(), self.state.clone()]
    }
}

#[derive(Debug, Serialize)]
pub struct BootstrapRow {
    pub endpoint: String,
    pub spawned: bool,
    pub pid: Option<u32>,
    pub log: Option<String>,
}

impl TableDisplay for BootstrapRow {
    fn headers() -> Vec<&'static str> {
        vec!["Endpoint", "Started", "PID", "Log"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.endpoint.clone(),
            if self.spawned { "yes" } else { "already running" }.to_string(),
            self.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            self.log.clone().unwrap_or_else(|| "-".to_string()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

fn result_cell(outcome: &ScenarioOutcome) -> Cell {
    if outcome.passed {
        Cell::new("PASS").fg(Color::Green)
    } else {
        Cell::new("FAIL").fg(Color::Red)
    }
}

pub fn render_report(report: &RunReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
        OutputFormat::Text => {
            let mut table = table();
            table.set_header(vec!["Scenario", "Result", "Time", "Evidence", "Note"]);
            for outcome in &report.outcomes {
                table.add_row(vec![
                    Cell::new(&outcome.name),
                    result_cell(outcome),
                    Cell::new(format!("{:.1}s", outcome.elapsed_ms as f64 / 1000.0)),
                    Cell::new(outcome.evidence.len()),
                    Cell::new(&outcome.note),
                ]);
            }
            format!(
                "{table}\n{}/{} passed. Evidence: {}",
                report.passed_count(),
                report.outcomes.len(),
                report.evidence_dir.display()
            )
        }
    }
}
