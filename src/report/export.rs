//! JSON report export.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::table::SummaryTable;

/// Run settings recorded alongside the tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub fta_equity_version: String,
    pub input_file: String,
    pub catalog_file: String,
    pub seed: u64,
    pub test_fraction: f64,
    pub selection_metric: String,
    pub rows_analyzed: usize,
}

impl ReportMetadata {
    /// Metadata stamped with the current UTC time and crate version.
    pub fn now(input_file: &Path, catalog_file: &Path) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            fta_equity_version: env!("CARGO_PKG_VERSION").to_string(),
            input_file: input_file.display().to_string(),
            catalog_file: catalog_file.display().to_string(),
            seed: 0,
            test_fraction: 0.0,
            selection_metric: String::new(),
            rows_analyzed: 0,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, seed: u64, test_fraction: f64, metric: &str) -> Self {
        self.seed = seed;
        self.test_fraction = test_fraction;
        self.selection_metric = metric.to_string();
        self
    }

    #[must_use]
    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows_analyzed = rows;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub tables: Vec<SummaryTable>,
}

impl Report {
    pub fn table(&self, title: &str) -> Option<&SummaryTable> {
        self.tables.iter().find(|t| t.title == title)
    }
}

/// Write the report as pretty-printed JSON.
pub fn export_report(report: &Report, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")?;
    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;
    Ok(())
}

pub fn read_report(path: &Path) -> Result<Report> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report from {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid report JSON in {}", path.display()))
}
