//! Outcome and flag decoding
//!
//! Maps the outcome column (failure to appear) and the yes/no event columns
//! used by evaluation (released, bail set, race flags) to `Option<bool>`.

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::frame::{column_as_strings, LabelledFrame, ValueLabels};

/// Explicit mapping from outcome values to event / non-event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetMapping {
    pub event_value: String,
    pub non_event_value: String,
}

impl TargetMapping {
    pub fn new(event_value: impl Into<String>, non_event_value: impl Into<String>) -> Self {
        Self {
            event_value: event_value.into(),
            non_event_value: non_event_value.into(),
        }
    }
}

/// What an outcome column needs before it can be decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetAnalysis {
    /// Boolean, or numeric holding only 0 and 1.
    AlreadyBinary,
    /// Every value is a yes/no or true/false word.
    YesNo,
    /// Anything else; holds the distinct values, sorted.
    NeedsMapping { unique_values: Vec<String> },
}

/// Classify the outcome column's values.
///
/// Fails when the column is absent or holds no non-null value.
pub fn analyze_target_column(df: &DataFrame, column: &str) -> Result<TargetAnalysis> {
    let values = column_as_strings(df, column)
        .with_context(|| format!("Outcome column '{}' not found", column))?;
    let mut distinct: Vec<String> = values.into_iter().flatten().collect();
    if distinct.is_empty() {
        anyhow::bail!("Outcome column '{}' has no non-null values", column);
    }
    distinct.sort();
    distinct.dedup();

    let dtype = df.column(column)?.dtype().clone();
    let zero_one = distinct.iter().all(|v| v == "0" || v == "1");
    if dtype == DataType::Boolean || (dtype.is_primitive_numeric() && zero_one) {
        return Ok(TargetAnalysis::AlreadyBinary);
    }
    if distinct.iter().all(|v| yes_no(v).is_some()) {
        return Ok(TargetAnalysis::YesNo);
    }
    Ok(TargetAnalysis::NeedsMapping {
        unique_values: distinct,
    })
}

fn yes_no(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "yes" | "true" | "y" => Some(true),
        "0" | "no" | "false" | "n" => Some(false),
        _ => None,
    }
}

fn mapped(value: &str, mapping: &TargetMapping) -> Option<bool> {
    if value == mapping.event_value {
        Some(true)
    } else if value == mapping.non_event_value {
        Some(false)
    } else {
        None
    }
}

/// Mapping implied by a value-label table that labels the codes 0 and 1,
/// e.g. `0 = "Detained"` and `1 = "Released"`. Labels on other codes are
/// left unmapped.
pub fn label_mapping(labels: &ValueLabels) -> Option<TargetMapping> {
    let event = labels.get(&1)?;
    let non_event = labels.get(&0)?;
    (event != non_event).then(|| TargetMapping::new(event.as_str(), non_event.as_str()))
}

/// Decode a column to flags.
///
/// With a mapping only the two mapped values are known. Without one, boolean
/// columns, numeric 0/1 and case-insensitive yes/no/true/false are accepted.
/// Anything else is `None`.
pub fn decode_flags(
    df: &DataFrame,
    column: &str,
    mapping: Option<&TargetMapping>,
) -> Result<Vec<Option<bool>>> {
    let values = column_as_strings(df, column)
        .with_context(|| format!("Column '{}' not found", column))?;

    let flags = values
        .iter()
        .map(|v| {
            let v = v.as_deref()?;
            match mapping {
                Some(m) => mapped(v, m),
                None => yes_no(v),
            }
        })
        .collect();

    Ok(flags)
}

/// Decode a yes/no column of a labelled frame.
///
/// Codes 0 and 1 are usually decoded to their labels before this runs, so a
/// 0/1 label table is used as the mapping. Values it does not cover fall back
/// to the rules of [`decode_flags`] without a mapping.
pub fn decode_labelled_flags(frame: &LabelledFrame, column: &str) -> Result<Vec<Option<bool>>> {
    let mapping = frame
        .meta(column)
        .and_then(|m| label_mapping(&m.value_labels));
    let values = column_as_strings(&frame.df, column)
        .with_context(|| format!("Column '{}' not found", column))?;

    let flags: Vec<Option<bool>> = values
        .iter()
        .map(|v| {
            let v = v.as_deref()?;
            mapping.as_ref().and_then(|m| mapped(v, m)).or_else(|| yes_no(v))
        })
        .collect();

    if flags.iter().all(Option::is_none) && values.iter().any(Option::is_some) {
        warn!(
            column,
            "No value reads as yes/no; every row is treated as unknown"
        );
    }
    Ok(flags)
}

/// Drop rows with an unknown outcome and store the outcome as a Boolean
/// column. Returns the filtered frame and the number of rows dropped.
pub fn filter_known_outcome(
    frame: &LabelledFrame,
    outcome: &str,
    mapping: Option<&TargetMapping>,
) -> Result<(LabelledFrame, usize)> {
    let flags = decode_flags(&frame.df, outcome, mapping)?;
    let mask: Vec<bool> = flags.iter().map(Option::is_some).collect();
    let dropped = mask.iter().filter(|keep| !**keep).count();

    let mut filtered = frame.filter(&mask)?;
    let known: Vec<bool> = flags.into_iter().flatten().collect();
    filtered
        .df
        .with_column(Column::new(outcome.into(), known))?;

    Ok((filtered, dropped))
}
