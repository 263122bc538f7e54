//! Design matrix construction
//!
//! [`FeatureSchema::fit`] learns each input column's encoding from the union
//! of the frames it is given, so train and test partitions share one set of
//! levels. [`FeatureSchema::encode`] then produces a column-major
//! [`FeatureMatrix`] with stable names.

use std::collections::{BTreeSet, HashSet};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::frame::{column_as_bools, column_as_f64, column_as_strings};

/// Errors from feature encoding.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("feature column '{column}' not found")]
    MissingColumn { column: String },

    #[error("column '{column}' has level '{level}' that is not in the fitted schema")]
    UnknownLevel { column: String, level: String },

    #[error("column '{column}' has unsupported type {dtype}")]
    UnsupportedType { column: String, dtype: String },

    #[error("no feature columns to encode")]
    NoFeatures,

    #[error(transparent)]
    Frame(#[from] PolarsError),
}

/// How one source column is encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Passed through; missing becomes `NaN`.
    Numeric,
    /// 0/1; missing becomes `NaN`.
    Boolean,
    /// One indicator per level after the first (baseline) level.
    Categorical { levels: Vec<String> },
}

/// Encoding of one source column and the output columns it produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub source: String,
    pub kind: FeatureKind,
    /// Categorical only: emit a `<col>_missing` indicator.
    pub missing_indicator: bool,
    /// Names of the produced matrix columns, in order.
    pub outputs: Vec<String>,
}

/// Encoding learned from training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<FeatureColumn>,
}

/// Column-major numeric design matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    n_rows: usize,
}

/// Make a name safe for downstream tools: `[A-Za-z0-9_]`, no leading digit.
pub fn safe_name(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    let mut last_underscore = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            name.push(ch);
            last_underscore = false;
        } else if !last_underscore {
            name.push('_');
            last_underscore = true;
        }
    }
    let trimmed = name.trim_matches('_');
    let mut name = if trimmed.is_empty() {
        "x".to_string()
    } else {
        trimmed.to_string()
    };
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, 'x');
    }
    name
}

fn unique_name(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{}_{}", base, suffix);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}

fn kind_of(column: &Column) -> Result<FeatureKind, FeatureError> {
    match column.dtype() {
        DataType::Boolean => Ok(FeatureKind::Boolean),
        DataType::String => Ok(FeatureKind::Categorical { levels: Vec::new() }),
        dtype if dtype.is_primitive_numeric() => Ok(FeatureKind::Numeric),
        dtype => Err(FeatureError::UnsupportedType {
            column: column.name().to_string(),
            dtype: dtype.to_string(),
        }),
    }
}

fn categorical_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    Ok(column_as_strings(df, name)?
        .into_iter()
        .map(|v| v.filter(|s| !s.trim().is_empty()))
        .collect())
}

impl FeatureSchema {
    /// Learn encodings for `columns` from the union of `frames`.
    pub fn fit(frames: &[&DataFrame], columns: &[String]) -> Result<Self, FeatureError> {
        if columns.is_empty() {
            return Err(FeatureError::NoFeatures);
        }

        let mut used = HashSet::new();
        let mut fitted = Vec::with_capacity(columns.len());

        for name in columns {
            let first = frames
                .first()
                .and_then(|df| df.column(name).ok())
                .ok_or_else(|| FeatureError::MissingColumn {
                    column: name.clone(),
                })?;
            let base = safe_name(name);

            let (kind, missing_indicator, outputs) = match kind_of(first)? {
                FeatureKind::Categorical { .. } => {
                    let mut levels = BTreeSet::new();
                    let mut any_missing = false;
                    for df in frames {
                        if df.column(name).is_err() {
                            return Err(FeatureError::MissingColumn {
                                column: name.clone(),
                            });
                        }
                        for value in categorical_values(df, name)? {
                            match value {
                                Some(level) => {
                                    levels.insert(level);
                                }
                                None => any_missing = true,
                            }
                        }
                    }
                    let levels: Vec<String> = levels.into_iter().collect();
                    let mut outputs: Vec<String> = levels
                        .iter()
                        .skip(1)
                        .map(|level| {
                            unique_name(format!("{}_{}", base, safe_name(level)), &mut used)
                        })
                        .collect();
                    if any_missing {
                        outputs.push(unique_name(format!("{}_missing", base), &mut used));
                    }
                    (FeatureKind::Categorical { levels }, any_missing, outputs)
                }
                kind => (kind, false, vec![unique_name(base, &mut used)]),
            };

            fitted.push(FeatureColumn {
                source: name.clone(),
                kind,
                missing_indicator,
                outputs,
            });
        }

        let schema = Self { columns: fitted };
        debug!(
            sources = schema.columns.len(),
            outputs = schema.n_outputs(),
            "Fitted feature schema"
        );
        Ok(schema)
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn n_outputs(&self) -> usize {
        self.columns.iter().map(|c| c.outputs.len()).sum()
    }

    pub fn output_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|c| c.outputs.iter().cloned())
            .collect()
    }

    /// Encode a frame with this schema.
    ///
    /// # Errors
    /// * `FeatureError::MissingColumn` - A source column is absent
    /// * `FeatureError::UnknownLevel` - A categorical level was not seen at fit time
    pub fn encode(&self, df: &DataFrame) -> Result<FeatureMatrix, FeatureError> {
        let n_rows = df.height();
        let mut columns = Vec::with_capacity(self.n_outputs());

        for feature in &self.columns {
            if df.column(&feature.source).is_err() {
                return Err(FeatureError::MissingColumn {
                    column: feature.source.clone(),
                });
            }

            match &feature.kind {
                FeatureKind::Numeric => {
                    let values = column_as_f64(df, &feature.source)?;
                    columns.push(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect());
                }
                FeatureKind::Boolean => {
                    let values = column_as_bools(df, &feature.source)?;
                    columns.push(
                        values
                            .into_iter()
                            .map(|v| v.map_or(f64::NAN, |b| if b { 1.0 } else { 0.0 }))
                            .collect(),
                    );
                }
                FeatureKind::Categorical { levels } => {
                    let values = categorical_values(df, &feature.source)?;
                    let n_levels = levels.len().saturating_sub(1);
                    let mut indicators = vec![vec![0.0; n_rows]; n_levels];
                    let mut missing = vec![0.0; n_rows];

                    for (row, value) in values.iter().enumerate() {
                        match value {
                            Some(level) => {
                                let position = levels.binary_search(level).map_err(|_| {
                                    FeatureError::UnknownLevel {
                                        column: feature.source.clone(),
                                        level: level.clone(),
                                    }
                                })?;
                                if position > 0 {
                                    indicators[position - 1][row] = 1.0;
                                }
                            }
                            None if feature.missing_indicator => missing[row] = 1.0,
                            // No missing values at fit time: the row falls on the baseline
                            None => {}
                        }
                    }

                    columns.extend(indicators);
                    if feature.missing_indicator {
                        columns.push(missing);
                    }
                }
            }
        }

        Ok(FeatureMatrix {
            names: self.output_names(),
            columns,
            n_rows,
        })
    }
}

impl FeatureMatrix {
    /// Build from column-major data. All columns must have `n_rows` entries.
    pub fn from_columns(names: Vec<String>, columns: Vec<Vec<f64>>) -> Option<Self> {
        if names.len() != columns.len() {
            return None;
        }
        let n_rows = columns.first().map_or(0, Vec::len);
        if columns.iter().any(|c| c.len() != n_rows) {
            return None;
        }
        Some(Self {
            names,
            columns,
            n_rows,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, feature: usize) -> &[f64] {
        &self.columns[feature]
    }

    pub fn value(&self, row: usize, feature: usize) -> f64 {
        self.columns[feature][row]
    }

    /// Gather rows by index.
    pub fn select_rows(&self, rows: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| rows.iter().map(|&r| c[r]).collect())
                .collect(),
            n_rows: rows.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train() -> DataFrame {
        df! {
            "charge type" => [Some("Felony"), Some("Misdemeanor"), None, Some("Felony")],
            "priors" => [Some(0.0f64), None, Some(3.0), Some(1.0)],
            "employed" => [Some(true), Some(false), None, Some(true)],
        }
        .unwrap()
    }

    fn columns() -> Vec<String> {
        vec!["charge type".into(), "priors".into(), "employed".into()]
    }

    #[test]
    fn test_safe_name() {
        assert_eq!(safe_name("charge type"), "charge_type");
        assert_eq!(safe_name("18-24"), "x18_24");
        assert_eq!(safe_name("a..b"), "a_b");
        assert_eq!(safe_name("%%"), "x");
    }

    #[test]
    fn test_fit_and_encode() {
        let df = train();
        let schema = FeatureSchema::fit(&[&df], &columns()).unwrap();
        assert_eq!(
            schema.output_names(),
            vec!["charge_type_Misdemeanor", "charge_type_missing", "priors", "employed"]
        );

        let matrix = schema.encode(&df).unwrap();
        assert_eq!(matrix.n_rows(), 4);
        assert_eq!(matrix.column(0), &[0.0, 1.0, 0.0, 0.0]);
        assert_eq!(matrix.column(1), &[0.0, 0.0, 1.0, 0.0]);
        assert!(matrix.value(1, 2).is_nan());
        assert!(matrix.value(2, 3).is_nan());
    }

    #[test]
    fn test_union_levels_from_all_frames() {
        let train = train();
        let test = df! {
            "charge type" => [Some("Violation")],
            "priors" => [Some(2.0f64)],
            "employed" => [Some(false)],
        }
        .unwrap();

        let schema = FeatureSchema::fit(&[&train, &test], &columns()).unwrap();
        let a = schema.encode(&train).unwrap();
        let b = schema.encode(&test).unwrap();
        assert_eq!(a.names(), b.names());
        assert!(a.names().contains(&"charge_type_Violation".to_string()));
    }

    #[test]
    fn test_unknown_level_is_error() {
        let train = train();
        let schema = FeatureSchema::fit(&[&train], &columns()).unwrap();
        let other = df! {
            "charge type" => [Some("Violation")],
            "priors" => [Some(2.0f64)],
            "employed" => [Some(false)],
        }
        .unwrap();
        assert!(matches!(
            schema.encode(&other),
            Err(FeatureError::UnknownLevel { level, .. }) if level == "Violation"
        ));
    }

    #[test]
    fn test_reencoding_is_identical() {
        let df = train();
        let schema = FeatureSchema::fit(&[&df], &columns()).unwrap();
        let first = schema.encode(&df).unwrap();
        let second = schema.encode(&df).unwrap();
        assert_eq!(first.names(), second.names());
        for i in 0..first.n_features() {
            let a: Vec<u64> = first.column(i).iter().map(|v| v.to_bits()).collect();
            let b: Vec<u64> = second.column(i).iter().map(|v| v.to_bits()).collect();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_duplicate_names_are_suffixed() {
        let df = df! {
            "a b" => [1.0f64, 2.0],
            "a_b" => [3.0f64, 4.0],
        }
        .unwrap();
        let schema = FeatureSchema::fit(&[&df], &["a b".into(), "a_b".into()]).unwrap();
        assert_eq!(schema.output_names(), vec!["a_b", "a_b_2"]);
    }

    #[test]
    fn test_select_rows() {
        let matrix = FeatureMatrix::from_columns(
            vec!["x".into(), "y".into()],
            vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
        )
        .unwrap();
        let subset = matrix.select_rows(&[2, 0]);
        assert_eq!((subset.value(0, 0), subset.value(0, 1)), (3.0, 6.0));
        assert_eq!(subset.n_rows(), 2);
    }
}
