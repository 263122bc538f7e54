//! Observation table with per-column label metadata.
//!
//! Stata files carry a display label and an optional code → text table for
//! every variable. Both travel alongside the polars `DataFrame` in
//! [`VariableMeta`] so that numeric coercion and row filtering keep them.

use std::collections::{BTreeMap, HashMap};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Code → label table for one variable.
pub type ValueLabels = BTreeMap<i64, String>;

/// Display label and value labels for one column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableMeta {
    pub display_label: Option<String>,
    pub value_labels: ValueLabels,
}

impl VariableMeta {
    pub fn has_value_labels(&self) -> bool {
        !self.value_labels.is_empty()
    }
}

/// A `DataFrame` paired with its column metadata.
#[derive(Debug, Clone, Default)]
pub struct LabelledFrame {
    pub df: DataFrame,
    pub meta: HashMap<String, VariableMeta>,
}

impl LabelledFrame {
    pub fn new(df: DataFrame) -> Self {
        Self {
            df,
            meta: HashMap::new(),
        }
    }

    pub fn with_meta(df: DataFrame, meta: HashMap<String, VariableMeta>) -> Self {
        Self { df, meta }
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }

    pub fn meta(&self, column: &str) -> Option<&VariableMeta> {
        self.meta.get(column)
    }

    /// Display label when one is set, otherwise the column name.
    pub fn display_name<'a>(&'a self, column: &'a str) -> &'a str {
        self.meta
            .get(column)
            .and_then(|m| m.display_label.as_deref())
            .unwrap_or(column)
    }

    /// Keep only `columns`, in the given order. Metadata of dropped columns
    /// is discarded.
    pub fn select(&self, columns: &[String]) -> PolarsResult<LabelledFrame> {
        let df = self.df.select(columns.iter().map(|s| s.as_str()))?;
        let meta = columns
            .iter()
            .filter_map(|c| self.meta.get(c).map(|m| (c.clone(), m.clone())))
            .collect();
        Ok(LabelledFrame { df, meta })
    }

    /// Keep rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> PolarsResult<LabelledFrame> {
        let mask = BooleanChunked::from_slice("mask".into(), mask);
        Ok(LabelledFrame {
            df: self.df.filter(&mask)?,
            meta: self.meta.clone(),
        })
    }

    /// Gather rows by position.
    pub fn take(&self, rows: &[usize]) -> PolarsResult<LabelledFrame> {
        let idx = IdxCa::from_vec(
            "idx".into(),
            rows.iter().map(|&r| r as IdxSize).collect(),
        );
        Ok(LabelledFrame {
            df: self.df.take(&idx)?,
            meta: self.meta.clone(),
        })
    }
}

/// Column values as `f64`, casting when needed. Non-castable values are `None`.
pub fn column_as_f64(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let column = df.column(name)?;
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

/// Column values as strings. Numbers are rendered without a trailing `.0`.
pub fn column_as_strings(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let column = df.column(name)?;
    match column.dtype() {
        DataType::String => Ok(column
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect()),
        DataType::Boolean => Ok(column
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| b.to_string()))
            .collect()),
        dtype if dtype.is_primitive_numeric() => Ok(column_as_f64(df, name)?
            .into_iter()
            .map(|v| v.map(format_number))
            .collect()),
        _ => {
            let cast = column.cast(&DataType::String)?;
            Ok(cast
                .str()?
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect())
        }
    }
}

/// Column values as booleans. Only Boolean columns and numeric 0/1 are accepted.
pub fn column_as_bools(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<bool>>> {
    let column = df.column(name)?;
    if column.dtype() == &DataType::Boolean {
        return Ok(column.bool()?.into_iter().collect());
    }
    Ok(column_as_f64(df, name)?
        .into_iter()
        .map(|v| match v {
            Some(x) if x == 1.0 => Some(true),
            Some(x) if x == 0.0 => Some(false),
            _ => None,
        })
        .collect())
}

/// Integer-valued floats print without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
