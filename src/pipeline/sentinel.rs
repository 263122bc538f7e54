//! Sentinel missing-value recoding
//!
//! Legacy survey extracts encode "missing" and "not applicable" as a repeated
//! digit spanning the column's magnitude: `9`, `99`, `999` and, for some
//! columns, `8`, `88`, `888`. The width is taken from the largest observed
//! value in each column, so a column topping out at two digits loses its
//! `99`s but keeps a legitimate `98`.

use std::collections::HashSet;

use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

use super::frame::LabelledFrame;

/// Which repeated digits count as sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SentinelPass {
    /// Repeated 9s only.
    Standard,
    /// Repeated 9s and repeated 8s.
    Strict,
}

/// Per-column choice of pass, plus columns that are never recoded.
#[derive(Debug, Clone, Default)]
pub struct SentinelPolicy {
    pub strict_columns: HashSet<String>,
    pub excluded_columns: HashSet<String>,
}

impl SentinelPolicy {
    #[must_use]
    pub fn with_strict<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strict_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_excluded<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn pass_for(&self, column: &str) -> Option<SentinelPass> {
        if self.excluded_columns.contains(column) {
            None
        } else if self.strict_columns.contains(column) {
            Some(SentinelPass::Strict)
        } else {
            Some(SentinelPass::Standard)
        }
    }
}

/// Outcome of recoding one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentinelReport {
    pub column: String,
    /// `None` when the column has no numeric interpretation.
    pub width: Option<u32>,
    pub candidates: Vec<f64>,
    pub recoded: usize,
}

/// What one recoding pass over a column's values found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecodeOutcome {
    /// `None` when no value is numeric.
    pub width: Option<u32>,
    pub candidates: Vec<f64>,
    pub recoded: usize,
}

/// Number of integer digits of the largest finite magnitude, or `None` when
/// no value is finite.
pub fn digit_width<I>(values: I) -> Option<u32>
where
    I: IntoIterator<Item = f64>,
{
    let max_abs = values
        .into_iter()
        .filter(|v| v.is_finite())
        .map(f64::abs)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))?;

    if max_abs < 1.0 {
        return Some(1);
    }
    Some(max_abs.log10().floor() as u32 + 1)
}

/// Repeated-digit values of the given width.
pub fn sentinel_candidates(width: u32, pass: SentinelPass) -> Vec<f64> {
    let digits: &[char] = match pass {
        SentinelPass::Standard => &['9'],
        SentinelPass::Strict => &['9', '8'],
    };
    digits
        .iter()
        .filter_map(|d| d.to_string().repeat(width as usize).parse::<f64>().ok())
        .collect()
}

/// Replace sentinel values with `None`.
pub fn recode_values(values: &mut [Option<f64>], pass: SentinelPass) -> RecodeOutcome {
    let Some(width) = digit_width(values.iter().flatten().copied()) else {
        return RecodeOutcome::default();
    };
    let candidates = sentinel_candidates(width, pass);

    let mut recoded = 0;
    for slot in values.iter_mut() {
        if let Some(v) = slot {
            if candidates.contains(v) {
                *slot = None;
                recoded += 1;
            }
        }
    }
    RecodeOutcome {
        width: Some(width),
        candidates,
        recoded,
    }
}

/// String variant of [`recode_values`]: entries that parse to a sentinel
/// become `None`; non-numeric strings are never touched.
pub fn recode_strings(values: &mut [Option<String>], pass: SentinelPass) -> RecodeOutcome {
    let parsed: Vec<Option<f64>> = values
        .iter()
        .map(|v| v.as_deref().and_then(|s| s.trim().parse::<f64>().ok()))
        .collect();
    let Some(width) = digit_width(parsed.iter().flatten().copied()) else {
        return RecodeOutcome::default();
    };
    let candidates = sentinel_candidates(width, pass);

    let mut recoded = 0;
    for (slot, number) in values.iter_mut().zip(parsed) {
        if number.is_some_and(|n| candidates.contains(&n)) {
            *slot = None;
            recoded += 1;
        }
    }
    RecodeOutcome {
        width: Some(width),
        candidates,
        recoded,
    }
}

/// Recode one column. Numeric columns come back as `Float64`, string columns
/// stay `String`, and other dtypes are returned unchanged.
pub fn recode_column(
    column: &Column,
    pass: SentinelPass,
) -> PolarsResult<(Column, SentinelReport)> {
    let name = column.name().clone();
    let (recoded_column, outcome) = match column.dtype() {
        dtype if dtype.is_primitive_numeric() => {
            let mut values: Vec<Option<f64>> = column
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .collect();
            let outcome = recode_values(&mut values, pass);
            (Column::new(name.clone(), values), outcome)
        }
        DataType::String => {
            let mut values: Vec<Option<String>> = column
                .str()?
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect();
            let outcome = recode_strings(&mut values, pass);
            (Column::new(name.clone(), values), outcome)
        }
        _ => (column.clone(), RecodeOutcome::default()),
    };

    Ok((
        recoded_column,
        SentinelReport {
            column: name.to_string(),
            width: outcome.width,
            candidates: outcome.candidates,
            recoded: outcome.recoded,
        },
    ))
}

/// Recode every column of the frame according to `policy`.
pub fn recode_frame(
    frame: &LabelledFrame,
    policy: &SentinelPolicy,
) -> PolarsResult<(LabelledFrame, Vec<SentinelReport>)> {
    let mut columns = Vec::with_capacity(frame.df.width());
    let mut reports = Vec::new();

    for column in frame.df.get_columns() {
        match policy.pass_for(column.name().as_str()) {
            Some(pass) => {
                let (recoded, report) = recode_column(column, pass)?;
                if report.recoded > 0 {
                    debug!(
                        column = %report.column,
                        width = ?report.width,
                        recoded = report.recoded,
                        "Recoded sentinel values"
                    );
                }
                columns.push(recoded);
                reports.push(report);
            }
            None => columns.push(column.clone()),
        }
    }

    Ok((
        LabelledFrame::with_meta(DataFrame::new(columns)?, frame.meta.clone()),
        reports,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_width() {
        assert_eq!(digit_width([3.0, 45.0, 99.0]), Some(2));
        assert_eq!(digit_width([-999.0, 12.0]), Some(3));
        assert_eq!(digit_width([0.0, 0.5]), Some(1));
        assert_eq!(digit_width([f64::NAN]), None);
        assert_eq!(digit_width(std::iter::empty()), None);
    }

    #[test]
    fn test_candidates_by_pass() {
        assert_eq!(sentinel_candidates(2, SentinelPass::Standard), vec![99.0]);
        assert_eq!(sentinel_candidates(3, SentinelPass::Strict), vec![999.0, 888.0]);
    }

    #[test]
    fn test_recode_values_keeps_near_misses() {
        let mut values = vec![Some(12.0), Some(98.0), Some(99.0), None, Some(88.0)];
        let outcome = recode_values(&mut values, SentinelPass::Standard);
        assert_eq!(outcome.width, Some(2));
        assert_eq!(outcome.recoded, 1);
        assert_eq!(values, vec![Some(12.0), Some(98.0), None, None, Some(88.0)]);
    }

    #[test]
    fn test_strict_pass_recodes_eights() {
        let mut values = vec![Some(12.0), Some(88.0), Some(99.0), Some(87.0)];
        let outcome = recode_values(&mut values, SentinelPass::Strict);
        assert_eq!(outcome.recoded, 2);
        assert_eq!(values, vec![Some(12.0), None, None, Some(87.0)]);
    }

    #[test]
    fn test_width_follows_largest_value() {
        // A two-digit 99 is a real value once the column reaches 4 digits
        let mut values = vec![Some(99.0), Some(1500.0), Some(9999.0)];
        recode_values(&mut values, SentinelPass::Standard);
        assert_eq!(values, vec![Some(99.0), Some(1500.0), None]);
    }

    #[test]
    fn test_non_numeric_strings_untouched() {
        let mut values = vec![Some("Male".to_string()), Some("Female".to_string()), None];
        let before = values.clone();
        let outcome = recode_strings(&mut values, SentinelPass::Strict);
        assert_eq!(outcome, RecodeOutcome::default());
        assert_eq!(values, before);
    }

    #[test]
    fn test_numeric_strings_recoded() {
        let mut values = vec![
            Some("4".to_string()),
            Some("9".to_string()),
            Some("Not applicable".to_string()),
        ];
        recode_strings(&mut values, SentinelPass::Standard);
        assert_eq!(
            values,
            vec![Some("4".to_string()), None, Some("Not applicable".to_string())]
        );
    }

    #[test]
    fn test_recode_frame_respects_policy() {
        let df = DataFrame::new(vec![
            Column::new("age".into(), vec![Some(25i32), Some(99), Some(40)]),
            Column::new("bail_amt".into(), vec![Some(500.0), Some(999.0), Some(100.0)]),
        ])
        .unwrap();
        let policy = SentinelPolicy::default().with_excluded(["bail_amt"]);
        let (recoded, reports) = recode_frame(&LabelledFrame::new(df), &policy).unwrap();

        let age: Vec<Option<f64>> =
            recoded.df.column("age").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(age, vec![Some(25.0), None, Some(40.0)]);
        assert_eq!(recoded.df.column("bail_amt").unwrap().null_count(), 0);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].recoded, 1);
    }
}
