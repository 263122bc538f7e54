//! End-of-run summary shown on the console.

use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

/// Counts and timings collected while the pipeline runs.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub rows_loaded: usize,
    pub rows_analyzed: usize,
    pub columns_loaded: usize,
    pub columns_retained: usize,
    /// Catalog names not present in the dataset.
    pub absent_columns: Vec<String>,
    pub sentinel_columns: usize,
    pub sentinel_values: usize,
    pub decoded_columns: usize,
    pub numeric_columns: usize,
    /// (variant, feature count, test accuracy)
    pub models: Vec<(String, usize, f64)>,
    pub load_time: Duration,
    pub clean_time: Duration,
    pub train_time: Duration,
    pub evaluate_time: Duration,
}

impl RunSummary {
    pub fn new(rows_loaded: usize, columns_loaded: usize) -> Self {
        Self {
            rows_loaded,
            columns_loaded,
            ..Default::default()
        }
    }

    pub fn total_time(&self) -> Duration {
        self.load_time + self.clean_time + self.train_time + self.evaluate_time
    }

    pub fn rows_dropped(&self) -> usize {
        self.rows_loaded.saturating_sub(self.rows_analyzed)
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("RUN SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

        table.add_row(vec![Cell::new("📁 Rows loaded"), Cell::new(self.rows_loaded)]);
        table.add_row(vec![
            Cell::new("🚫 Rows without outcome"),
            Cell::new(self.rows_dropped()).fg(if self.rows_dropped() == 0 {
                Color::White
            } else {
                Color::Yellow
            }),
        ]);
        table.add_row(vec![
            Cell::new("✅ Rows analyzed"),
            Cell::new(self.rows_analyzed)
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);
        table.add_row(vec![
            Cell::new("📊 Columns retained"),
            Cell::new(format!("{} of {}", self.columns_retained, self.columns_loaded)),
        ]);
        table.add_row(vec![
            Cell::new("🔢 Sentinel codes recoded"),
            Cell::new(format!(
                "{} values in {} columns",
                self.sentinel_values, self.sentinel_columns
            )),
        ]);
        table.add_row(vec![
            Cell::new("🏷️  Label-decoded columns"),
            Cell::new(self.decoded_columns),
        ]);
        table.add_row(vec![
            Cell::new("🔄 Converted to numeric"),
            Cell::new(self.numeric_columns),
        ]);

        for (variant, n_features, accuracy) in &self.models {
            table.add_row(vec![
                Cell::new(format!("🌲 {} model", variant)),
                Cell::new(format!(
                    "{} features, test accuracy {:.1}%",
                    n_features,
                    accuracy * 100.0
                ))
                .fg(Color::Cyan),
            ]);
        }

        table.add_row(vec![
            Cell::new("⏱️  Total time"),
            Cell::new(format!("{:.2}s", self.total_time().as_secs_f64())),
        ]);

        for line in table.to_string().lines() {
            println!("    {}", line);
        }

        if !self.absent_columns.is_empty() {
            println!();
            println!(
                "      {} {}:",
                style("Catalog variables not in dataset").yellow(),
                style(format!("({})", self.absent_columns.len())).dim()
            );
            for column in &self.absent_columns {
                println!("        {} {}", style("•").dim(), column);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals() {
        let mut summary = RunSummary::new(100, 12);
        summary.rows_analyzed = 90;
        summary.load_time = Duration::from_millis(200);
        summary.train_time = Duration::from_millis(800);
        assert_eq!(summary.rows_dropped(), 10);
        assert_eq!(summary.total_time(), Duration::from_secs(1));
    }
}
