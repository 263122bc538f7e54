//! Tests for missing value analysis on raw and cleaned tables

use fta_equity::pipeline::{analyze_missing_values, columns_above_threshold};
use polars::prelude::*;

#[path = "common/mod.rs"]
mod common;

#[test]
fn test_analyze_missing_values_basic() {
    let df = df! {
        "col_complete" => [1.0f64, 2.0, 3.0, 4.0, 5.0],
        "col_partial_missing" => [Some(1.0f64), Some(2.0), None, None, Some(5.0)],
        "col_all_missing" => [None::<f64>, None, None, None, None],
    }
    .unwrap();

    let ratios: std::collections::HashMap<_, _> =
        analyze_missing_values(&df).unwrap().into_iter().collect();

    assert!(ratios["col_complete"].abs() < 1e-9);
    assert!((ratios["col_partial_missing"] - 0.4).abs() < 1e-9);
    assert!((ratios["col_all_missing"] - 1.0).abs() < 1e-9);
}

#[test]
fn test_analyze_missing_values_sorted_descending() {
    let df = common::create_pretrial_dataframe(200, 3);
    let ratios = analyze_missing_values(&df).unwrap();

    assert_eq!(ratios.len(), df.width());
    for pair in ratios.windows(2) {
        assert!(pair[0].1 >= pair[1].1, "{:?} before {:?}", pair[0], pair[1]);
    }
}

#[test]
fn test_nan_counts_as_missing() {
    let df = df! { "x" => [1.0f64, f64::NAN, 3.0, 4.0] }.unwrap();
    let ratios = analyze_missing_values(&df).unwrap();
    assert!((ratios[0].1 - 0.25).abs() < 1e-9);
}

#[test]
fn test_empty_table() {
    let df = DataFrame::empty();
    assert!(analyze_missing_values(&df).unwrap().is_empty());
}

#[test]
fn test_columns_above_threshold() {
    let ratios = vec![
        ("a".to_string(), 0.8),
        ("b".to_string(), 0.3),
        ("c".to_string(), 0.1),
    ];
    assert_eq!(columns_above_threshold(&ratios, 0.3), vec!["a"]);
    assert!(columns_above_threshold(&ratios, 0.9).is_empty());
}
