//! Label decoding and numeric coercion
//!
//! Runs after sentinel recoding. Labelled code columns are decoded to their
//! text labels, then any text column whose values are all numbers (ignoring
//! the "not applicable" token) becomes `Float64`. Column metadata is carried
//! across both steps unchanged.

use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

use super::frame::{format_number, LabelledFrame, ValueLabels};

/// Token that marks a value as not applicable in text-coded columns.
pub const DEFAULT_NOT_APPLICABLE: &str = "Not applicable";

/// What happened to a column during coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoercionAction {
    /// Codes decoded to labels, kept as text.
    Decoded,
    /// Text (possibly decoded) converted to `Float64`.
    Numeric,
    /// Left as text.
    Categorical,
    /// Numeric or boolean column without labels, not touched.
    Unchanged,
}

/// Per-column coercion outcome.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoercionReport {
    pub actions: Vec<(String, CoercionAction)>,
}

impl CoercionReport {
    pub fn count(&self, action: CoercionAction) -> usize {
        self.actions.iter().filter(|(_, a)| *a == action).count()
    }

    pub fn action_for(&self, column: &str) -> Option<CoercionAction> {
        self.actions
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, a)| *a)
    }
}

/// Map numeric codes to their labels. Codes without a label keep their
/// numeric text.
pub fn decode_value_labels(column: &Column, labels: &ValueLabels) -> PolarsResult<Column> {
    let values: Vec<Option<String>> = column
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| {
            v.map(|code| {
                let key = code as i64;
                match labels.get(&key) {
                    Some(label) if key as f64 == code => label.clone(),
                    _ => format_number(code),
                }
            })
        })
        .collect();
    Ok(Column::new(column.name().clone(), values))
}

/// True when every present value other than `not_applicable` parses as a
/// number, and at least one does.
pub fn is_numeric_like(values: &[Option<String>], not_applicable: &str) -> bool {
    let mut any_numeric = false;
    for value in values.iter().flatten() {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == not_applicable {
            continue;
        }
        if trimmed.parse::<f64>().is_err() {
            return false;
        }
        any_numeric = true;
    }
    any_numeric
}

fn parse_numeric(values: &[Option<String>]) -> Vec<Option<f64>> {
    values
        .iter()
        .map(|v| {
            v.as_deref()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|x| x.is_finite())
        })
        .collect()
}

fn string_values(column: &Column) -> PolarsResult<Vec<Option<String>>> {
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Coerce one column. `labels` are the column's value labels, if any.
pub fn coerce_column(
    column: &Column,
    labels: Option<&ValueLabels>,
    not_applicable: &str,
) -> PolarsResult<(Column, CoercionAction)> {
    let labelled = labels.filter(|l| !l.is_empty());

    let (text, decoded) = match (column.dtype(), labelled) {
        (dtype, Some(labels)) if dtype.is_primitive_numeric() => {
            (decode_value_labels(column, labels)?, true)
        }
        (DataType::String, _) => (column.clone(), false),
        _ => return Ok((column.clone(), CoercionAction::Unchanged)),
    };

    let values = string_values(&text)?;
    if is_numeric_like(&values, not_applicable) {
        let numeric = parse_numeric(&values);
        return Ok((
            Column::new(column.name().clone(), numeric),
            CoercionAction::Numeric,
        ));
    }

    let action = if decoded {
        CoercionAction::Decoded
    } else {
        CoercionAction::Categorical
    };
    Ok((text, action))
}

/// Coerce every column of the frame.
pub fn coerce_frame(
    frame: &LabelledFrame,
    not_applicable: &str,
) -> PolarsResult<(LabelledFrame, CoercionReport)> {
    let mut columns = Vec::with_capacity(frame.df.width());
    let mut report = CoercionReport::default();

    for column in frame.df.get_columns() {
        let name = column.name().to_string();
        let labels = frame
            .meta(&name)
            .filter(|m| m.has_value_labels())
            .map(|m| &m.value_labels);
        let (coerced, action) = coerce_column(column, labels, not_applicable)?;
        debug!(column = %name, ?action, "Coerced column");
        columns.push(coerced);
        report.actions.push((name, action));
    }

    Ok((
        LabelledFrame::with_meta(DataFrame::new(columns)?, frame.meta.clone()),
        report,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::frame::VariableMeta;
    use std::collections::HashMap;

    fn sex_labels() -> ValueLabels {
        let mut labels = ValueLabels::new();
        labels.insert(1, "Male".to_string());
        labels.insert(2, "Female".to_string());
        labels
    }

    #[test]
    fn test_decode_keeps_unlabelled_codes() {
        let column = Column::new("sex".into(), vec![Some(1.0), Some(2.0), Some(3.0), None]);
        let decoded = decode_value_labels(&column, &sex_labels()).unwrap();
        let values: Vec<Option<&str>> = decoded.str().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some("Male"), Some("Female"), Some("3"), None]);
    }

    #[test]
    fn test_is_numeric_like() {
        let values = vec![
            Some("12".to_string()),
            Some("Not applicable".to_string()),
            None,
            Some("3.5".to_string()),
        ];
        assert!(is_numeric_like(&values, DEFAULT_NOT_APPLICABLE));

        let mixed = vec![Some("12".to_string()), Some("twelve".to_string())];
        assert!(!is_numeric_like(&mixed, DEFAULT_NOT_APPLICABLE));

        let only_token = vec![Some("Not applicable".to_string())];
        assert!(!is_numeric_like(&only_token, DEFAULT_NOT_APPLICABLE));
    }

    #[test]
    fn test_numeric_strings_become_float_with_token_missing() {
        let column = Column::new(
            "prior_ftas".into(),
            vec![Some("0"), Some("Not applicable"), Some("2")],
        );
        let (coerced, action) = coerce_column(&column, None, DEFAULT_NOT_APPLICABLE).unwrap();
        assert_eq!(action, CoercionAction::Numeric);
        let values: Vec<Option<f64>> = coerced.f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(0.0), None, Some(2.0)]);
    }

    #[test]
    fn test_coerce_frame_keeps_display_labels() {
        let df = DataFrame::new(vec![
            Column::new("sex".into(), vec![Some(1.0), Some(2.0)]),
            Column::new("charges".into(), vec![Some("3"), Some("1")]),
        ])
        .unwrap();
        let mut meta = HashMap::new();
        meta.insert(
            "sex".to_string(),
            VariableMeta {
                display_label: Some("Defendant sex".to_string()),
                value_labels: sex_labels(),
            },
        );
        meta.insert(
            "charges".to_string(),
            VariableMeta {
                display_label: Some("Number of charges".to_string()),
                value_labels: ValueLabels::new(),
            },
        );

        let (coerced, report) =
            coerce_frame(&LabelledFrame::with_meta(df, meta), DEFAULT_NOT_APPLICABLE).unwrap();

        assert_eq!(report.action_for("sex"), Some(CoercionAction::Decoded));
        assert_eq!(report.action_for("charges"), Some(CoercionAction::Numeric));
        assert_eq!(coerced.df.column("charges").unwrap().dtype(), &DataType::Float64);
        assert_eq!(coerced.display_name("charges"), "Number of charges");
        assert_eq!(coerced.display_name("sex"), "Defendant sex");
    }
}
