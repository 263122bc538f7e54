//! Missing value analysis

use anyhow::Result;
use polars::prelude::*;

/// Per-column missing ratio, sorted descending (ties by name).
pub fn analyze_missing_values(df: &DataFrame) -> Result<Vec<(String, f64)>> {
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let rows = df.height() as f64;
    let mut missing_ratios: Vec<(String, f64)> = df
        .get_columns()
        .iter()
        .map(|column| {
            let mut nulls = column.null_count();
            // NaN is how numeric missing survives some casts
            if column.dtype() == &DataType::Float64 {
                if let Ok(values) = column.f64() {
                    nulls += values.into_iter().flatten().filter(|v| v.is_nan()).count();
                }
            }
            (column.name().to_string(), nulls as f64 / rows)
        })
        .collect();

    missing_ratios.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    Ok(missing_ratios)
}

/// Columns whose missing ratio exceeds `threshold`
pub fn columns_above_threshold(missing_ratios: &[(String, f64)], threshold: f64) -> Vec<String> {
    missing_ratios
        .iter()
        .filter(|(_, ratio)| *ratio > threshold)
        .map(|(name, _)| name.clone())
        .collect()
}
