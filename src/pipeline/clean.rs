//! The cleaning stage: sentinel recoding, type coercion, column selection and
//! outcome filtering.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use super::catalog::{Catalog, Schema};
use super::coerce::{coerce_frame, CoercionReport};
use super::frame::LabelledFrame;
use super::missing::{analyze_missing_values, columns_above_threshold};
use super::sentinel::{recode_frame, SentinelReport};
use super::target::{analyze_target_column, filter_known_outcome, label_mapping, TargetAnalysis};
use crate::config::PipelineConfig;

/// Cleaned observation table and what cleaning did to it.
#[derive(Debug, Clone)]
pub struct CleanedData {
    pub frame: LabelledFrame,
    pub schema: Schema,
    pub sentinels: Vec<SentinelReport>,
    pub coercion: CoercionReport,
    pub rows_loaded: usize,
    pub columns_loaded: usize,
    /// Rows removed because the outcome was unknown.
    pub rows_dropped: usize,
    /// Per-column missing ratio, most missing first.
    pub missing: Vec<(String, f64)>,
    /// Columns whose missing ratio exceeds the configured warning level.
    pub sparse_columns: Vec<String>,
}

impl CleanedData {
    pub fn sentinel_values(&self) -> usize {
        self.sentinels.iter().map(|r| r.recoded).sum()
    }

    pub fn sentinel_columns(&self) -> usize {
        self.sentinels.iter().filter(|r| r.recoded > 0).count()
    }
}

/// Fill display labels from the catalog where the data file has none.
fn apply_catalog_labels(frame: &mut LabelledFrame, catalog: &Catalog) {
    for column in frame.column_names() {
        let Some(label) = catalog.get(&column).and_then(|e| e.label.clone()) else {
            continue;
        };
        let meta = frame.meta.entry(column).or_default();
        if meta.display_label.is_none() {
            meta.display_label = Some(label);
        }
    }
}

/// Run the cleaning stage on a loaded table.
#[instrument(skip_all, fields(rows = raw.height(), columns = raw.df.width()))]
pub fn clean_dataset(
    raw: &LabelledFrame,
    catalog: &Catalog,
    config: &PipelineConfig,
) -> Result<CleanedData> {
    let outcome = &config.roles.outcome;
    if !raw.has_column(outcome) {
        anyhow::bail!("Outcome column '{}' not found in dataset", outcome);
    }

    let (recoded, sentinels) =
        recode_frame(raw, &config.sentinels).context("Failed to recode sentinel values")?;
    let (coerced, coercion) =
        coerce_frame(&recoded, &config.not_applicable).context("Failed to coerce column types")?;

    let schema = catalog.resolve(&coerced.column_names(), &config.roles.auxiliary());
    let mut selected = schema
        .full_view(&coerced)
        .context("Failed to select catalogued columns")?;
    apply_catalog_labels(&mut selected, catalog);

    // Labelled 0/1 outcomes arrive here as their labels
    let mapping = config.outcome_mapping.clone().or_else(|| {
        selected
            .meta(outcome)
            .and_then(|m| label_mapping(&m.value_labels))
    });
    if mapping.is_none() {
        if let TargetAnalysis::NeedsMapping { unique_values } =
            analyze_target_column(&selected.df, outcome)?
        {
            warn!(
                column = %outcome,
                values = ?unique_values,
                "Outcome values other than 0/1 or yes/no are treated as unknown"
            );
        }
    }
    let (frame, rows_dropped) = filter_known_outcome(&selected, outcome, mapping.as_ref())?;
    if frame.height() == 0 {
        anyhow::bail!(
            "No rows have a known '{}' outcome; set --event-value and --non-event-value",
            outcome
        );
    }
    let missing = analyze_missing_values(&frame.df)?;
    let sparse_columns = columns_above_threshold(&missing, config.missing_warning);
    if !sparse_columns.is_empty() {
        warn!(
            columns = ?sparse_columns,
            threshold = config.missing_warning,
            "Columns are mostly missing after cleaning"
        );
    }

    info!(
        retained = frame.df.width(),
        rows = frame.height(),
        rows_dropped,
        "Cleaning complete"
    );

    Ok(CleanedData {
        frame,
        schema,
        sentinels,
        coercion,
        rows_loaded: raw.height(),
        columns_loaded: raw.df.width(),
        rows_dropped,
        missing,
        sparse_columns,
    })
}
