//! Tests for outcome analysis, flag decoding and outcome filtering

use fta_equity::pipeline::*;
use polars::prelude::*;

#[test]
fn test_analyze_binary_outcome() {
    let df = df! { "fta" => [0i32, 1, 0, 1, 0, 1] }.unwrap();
    assert_eq!(analyze_target_column(&df, "fta").unwrap(), TargetAnalysis::AlreadyBinary);

    let df = df! { "fta" => [0.0f64, 1.0, 0.0, 1.0] }.unwrap();
    assert_eq!(analyze_target_column(&df, "fta").unwrap(), TargetAnalysis::AlreadyBinary);
}

#[test]
fn test_analyze_yes_no_outcome() {
    let df = df! { "fta" => ["Yes", "No", "yes", "NO"] }.unwrap();
    assert_eq!(analyze_target_column(&df, "fta").unwrap(), TargetAnalysis::YesNo);
}

#[test]
fn test_analyze_coded_outcome_needs_mapping() {
    let df = df! { "fta" => ["FTA", "Appeared", "Unknown", "FTA"] }.unwrap();
    match analyze_target_column(&df, "fta").unwrap() {
        TargetAnalysis::NeedsMapping { unique_values } => {
            assert_eq!(unique_values, vec!["Appeared", "FTA", "Unknown"]);
        }
        other => panic!("Expected NeedsMapping, got {:?}", other),
    }
}

#[test]
fn test_analyze_rejects_missing_or_null_column() {
    let df = df! { "fta" => [None::<f64>, None] }.unwrap();
    assert!(analyze_target_column(&df, "fta").is_err());
    assert!(analyze_target_column(&df, "not_there").is_err());
}

#[test]
fn test_decode_flags_without_mapping() {
    let df = df! {
        "numeric" => [Some(1.0f64), Some(0.0), None, Some(2.0)],
        "text" => [Some("Yes"), Some("n"), Some("maybe"), None],
    }
    .unwrap();

    assert_eq!(
        decode_flags(&df, "numeric", None).unwrap(),
        vec![Some(true), Some(false), None, None]
    );
    assert_eq!(
        decode_flags(&df, "text", None).unwrap(),
        vec![Some(true), Some(false), None, None]
    );
}

#[test]
fn test_decode_flags_with_mapping() {
    let df = df! { "fta" => ["FTA", "Appeared", "Unknown", "FTA"] }.unwrap();
    let mapping = TargetMapping::new("FTA", "Appeared");

    let flags = decode_flags(&df, "fta", Some(&mapping)).unwrap();
    assert_eq!(flags, vec![Some(true), Some(false), None, Some(true)]);
}

#[test]
fn test_filter_known_outcome_drops_unknown_rows() {
    let df = df! {
        "fta" => ["FTA", "Appeared", "Unknown", "FTA", "Appeared"],
        "priors" => [3i64, 0, 1, 2, 0],
    }
    .unwrap();
    let frame = LabelledFrame::new(df);
    let mapping = TargetMapping::new("FTA", "Appeared");

    let (filtered, dropped) = filter_known_outcome(&frame, "fta", Some(&mapping)).unwrap();

    assert_eq!(dropped, 1);
    assert_eq!(filtered.height(), 4);
    let outcome: Vec<Option<bool>> =
        filtered.df.column("fta").unwrap().bool().unwrap().into_iter().collect();
    assert_eq!(outcome, vec![Some(true), Some(false), Some(true), Some(false)]);
    let priors: Vec<Option<i64>> =
        filtered.df.column("priors").unwrap().i64().unwrap().into_iter().collect();
    assert_eq!(priors, vec![Some(3), Some(0), Some(2), Some(0)]);
}
