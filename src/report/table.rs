//! Renderer-agnostic summary tables.

use serde::{Deserialize, Serialize};

/// One table cell. Formatting is left to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Cell {
    Text(String),
    Count(usize),
    /// A proportion in [0, 1].
    Ratio(f64),
    /// A currency or other continuous amount.
    Amount(f64),
    Missing,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn ratio(value: Option<f64>) -> Self {
        value.filter(|v| v.is_finite()).map_or(Cell::Missing, Cell::Ratio)
    }

    pub fn amount(value: Option<f64>) -> Self {
        value.filter(|v| v.is_finite()).map_or(Cell::Missing, Cell::Amount)
    }
}

/// A titled table with a header row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryTable {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl SummaryTable {
    pub fn new<I, S>(title: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: title.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Rows shorter than the header are padded with [`Cell::Missing`];
    /// longer rows are truncated.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Missing);
        self.rows.push(row);
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (`row`, column named `column`).
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)
    }
}
