//! End-to-end tests for the cleaning stage

use fta_equity::config::PipelineConfig;
use fta_equity::pipeline::catalog::{Catalog, CatalogEntry, CatalogError, ColumnRole};
use fta_equity::pipeline::coerce::CoercionAction;
use fta_equity::pipeline::demographics::{derive_profiles, RaceCategory};
use fta_equity::pipeline::frame::{column_as_f64, LabelledFrame, VariableMeta};
use fta_equity::pipeline::sentinel::SentinelPolicy;
use fta_equity::pipeline::{clean_dataset, decode_labelled_flags, ValueLabels};
use fta_equity::study::{evaluate, outcome_values, run_cleaning};
use fta_equity::Stage;
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

#[path = "common/mod.rs"]
mod common;

fn config() -> PipelineConfig {
    PipelineConfig::new("in.csv", "catalog.csv", "out", "fta")
}

/// 1000 rows whose `score` column has 30% `999` sentinels.
fn sentinel_frame() -> LabelledFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let n = 1000;
    let sentinel_rows = 300;
    let mut score: Vec<f64> = (0..n).map(|_| rng.gen_range(100..900) as f64).collect();
    for value in score.iter_mut().take(sentinel_rows) {
        *value = 999.0;
    }
    let fta: Vec<i64> = (0..n).map(|i| (i % 3 == 0) as i64).collect();

    LabelledFrame::new(df! { "fta" => fta, "score" => score }.unwrap())
}

#[test]
fn test_sentinels_become_missing() {
    let catalog = Catalog::from_entries(vec![
        CatalogEntry::new("fta").outcome(),
        CatalogEntry::new("score").keep(),
    ])
    .unwrap();

    let cleaned = clean_dataset(&sentinel_frame(), &catalog, &config()).unwrap();

    let score = column_as_f64(&cleaned.frame.df, "score").unwrap();
    assert_eq!(score.len(), 1000);
    assert!(score.iter().flatten().all(|v| *v != 999.0), "no sentinel survives");
    assert_eq!(score.iter().filter(|v| v.is_none()).count(), 300);

    let missing: HashMap<_, _> = cleaned.missing.iter().cloned().collect();
    assert!((missing["score"] - 0.3).abs() < 1e-9);
    assert_eq!(cleaned.sentinel_values(), 300);
    assert_eq!(cleaned.sentinel_columns(), 1);
}

#[test]
fn test_excluded_column_keeps_sentinels() {
    let catalog = Catalog::from_entries(vec![
        CatalogEntry::new("fta").outcome(),
        CatalogEntry::new("score").keep(),
    ])
    .unwrap();
    let mut config = config();
    config.sentinels = SentinelPolicy::default().with_excluded(["score"]);

    let cleaned = clean_dataset(&sentinel_frame(), &catalog, &config).unwrap();
    let score = column_as_f64(&cleaned.frame.df, "score").unwrap();
    assert_eq!(score.iter().filter(|v| **v == Some(999.0)).count(), 300);
}

#[test]
fn test_strict_pass_recodes_eights() {
    let df = df! {
        "fta" => [0i64, 1, 0, 1, 0, 1],
        "priors" => [1.0f64, 8.0, 9.0, 3.0, 2.0, 8.0],
    }
    .unwrap();
    let catalog = Catalog::from_entries(vec![
        CatalogEntry::new("fta").outcome(),
        CatalogEntry::new("priors").keep(),
    ])
    .unwrap();
    let mut config = config();
    config.sentinels = SentinelPolicy::default().with_strict(["priors"]);

    let cleaned = clean_dataset(&LabelledFrame::new(df), &catalog, &config).unwrap();
    let priors = column_as_f64(&cleaned.frame.df, "priors").unwrap();
    assert_eq!(priors, vec![Some(1.0), None, None, Some(3.0), Some(2.0), None]);
}

#[test]
fn test_value_labels_decoded_and_catalog_selects_columns() {
    let df = df! {
        "fta" => [1.0f64, 0.0, 0.0, 1.0],
        "sex" => [1.0f64, 2.0, 1.0, 2.0],
        "case_id" => [10i64, 11, 12, 13],
        "amount" => ["100", "Not applicable", "250", "75"],
    }
    .unwrap();
    let mut labels = ValueLabels::new();
    labels.insert(1, "Male".to_string());
    labels.insert(2, "Female".to_string());
    let meta = HashMap::from([(
        "sex".to_string(),
        VariableMeta {
            display_label: None,
            value_labels: labels,
        },
    )]);
    let catalog = Catalog::from_entries(vec![
        CatalogEntry::new("fta").outcome(),
        CatalogEntry::new("sex").discrim().with_label("Gender"),
        CatalogEntry::new("amount").keep(),
    ])
    .unwrap();

    let cleaned = clean_dataset(&LabelledFrame::with_meta(df, meta), &catalog, &config()).unwrap();

    assert_eq!(cleaned.frame.column_names(), vec!["fta", "sex", "amount"]);
    assert_eq!(cleaned.schema.role("sex"), Some(ColumnRole::Demographic));
    assert_eq!(cleaned.frame.display_name("sex"), "Gender");

    let sex: Vec<Option<&str>> =
        cleaned.frame.df.column("sex").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(sex, vec![Some("Male"), Some("Female"), Some("Male"), Some("Female")]);
    assert_eq!(cleaned.coercion.action_for("sex"), Some(CoercionAction::Decoded));

    assert_eq!(cleaned.coercion.action_for("amount"), Some(CoercionAction::Numeric));
    let amount = column_as_f64(&cleaned.frame.df, "amount").unwrap();
    assert_eq!(amount, vec![Some(100.0), None, Some(250.0), Some(75.0)]);
}

#[test]
fn test_missing_outcome_column_fails() {
    let df = df! { "priors" => [1.0f64, 2.0] }.unwrap();
    let catalog = Catalog::from_entries(vec![CatalogEntry::new("fta").outcome()]).unwrap();

    let err = clean_dataset(&LabelledFrame::new(df), &catalog, &config()).unwrap_err();
    assert!(err.to_string().contains("fta"));
}

#[test]
fn test_run_cleaning_on_fixture() {
    let fixture = common::PretrialFixture::new(400, 11);
    let (catalog, cleaned) = run_cleaning(&fixture.config()).unwrap();

    assert_eq!(catalog.len(), 12);
    assert_eq!(cleaned.rows_loaded, 400);
    assert_eq!(cleaned.rows_dropped, 0);
    assert_eq!(cleaned.frame.height(), 400);
    assert_eq!(cleaned.columns_loaded, 12);
    assert!(!cleaned.frame.has_column("case_id"), "uncatalogued columns are dropped");
    assert!(cleaned.frame.has_column("bail_amount"), "role columns are kept");
    assert_eq!(cleaned.schema.absent_columns(), &["court_zip".to_string()]);

    // Sentinel ages were recoded
    let age = column_as_f64(&cleaned.frame.df, "age").unwrap();
    assert!(age.iter().flatten().all(|a| *a < 99.0));
    assert!(age.iter().any(Option::is_none));
}

#[test]
fn test_run_cleaning_rejects_unflagged_outcome() {
    let fixture = common::PretrialFixture::new(50, 2);
    let mut config = fixture.config();
    config.roles.outcome = "priors".to_string();

    let err = run_cleaning(&config).unwrap_err();
    assert_eq!(err.stage, Stage::Clean);
    let source = err.source.downcast_ref::<CatalogError>();
    assert!(matches!(source, Some(CatalogError::OutcomeNotFlagged { .. })));
}

#[test]
fn test_run_cleaning_rejects_uncatalogued_role() {
    let fixture = common::PretrialFixture::new(50, 2);
    let mut config = fixture.config();
    config.roles.released = Some("case_id".to_string());

    let err = run_cleaning(&config).unwrap_err();
    assert_eq!(err.stage, Stage::Clean);
    assert!(format!("{:#}", anyhow::Error::from(err)).contains("case_id"));
}

#[test]
fn test_coded_outcome_needs_mapping() {
    let df = df! {
        "fta" => ["FTA", "Appeared", "Appeared", "Pending", "FTA"],
        "priors" => [2.0f64, 0.0, 1.0, 0.0, 4.0],
    }
    .unwrap();
    let catalog = Catalog::from_entries(vec![
        CatalogEntry::new("fta").outcome(),
        CatalogEntry::new("priors").keep(),
    ])
    .unwrap();
    let frame = LabelledFrame::new(df);

    let err = clean_dataset(&frame, &catalog, &config()).unwrap_err();
    assert!(err.to_string().contains("--event-value"));

    let mut mapped = config();
    mapped.outcome_mapping = Some(fta_equity::pipeline::TargetMapping::new("FTA", "Appeared"));
    let cleaned = clean_dataset(&frame, &catalog, &mapped).unwrap();
    assert_eq!(cleaned.rows_dropped, 1);
    assert_eq!(cleaned.frame.height(), 4);
}

fn binary_labels(no: &str, yes: &str) -> VariableMeta {
    let mut labels = ValueLabels::new();
    labels.insert(0, no.to_string());
    labels.insert(1, yes.to_string());
    VariableMeta {
        display_label: None,
        value_labels: labels,
    }
}

#[test]
fn test_labelled_flags_survive_label_decoding() {
    let df = df! {
        "fta" => [1.0f64, 0.0, 0.0, 1.0, 0.0, 1.0],
        "priors" => [2.0f64, 0.0, 1.0, 3.0, 0.0, 4.0],
        "released" => [1.0f64, 1.0, 0.0, 1.0, 0.0, 1.0],
        "bail" => [0.0f64, 1.0, 1.0, 1.0, 0.0, 0.0],
        "black" => [1.0f64, 0.0, 1.0, 0.0, 0.0, 1.0],
    }
    .unwrap();
    let meta = HashMap::from([
        ("fta".to_string(), binary_labels("Appeared", "FTA")),
        ("released".to_string(), binary_labels("Detained", "Released")),
        ("bail".to_string(), binary_labels("No bail", "Bail set")),
        ("black".to_string(), binary_labels("Not Black", "Black")),
    ]);
    let catalog = Catalog::from_entries(vec![
        CatalogEntry::new("fta").outcome(),
        CatalogEntry::new("priors").keep(),
        CatalogEntry::new("released"),
        CatalogEntry::new("bail"),
        CatalogEntry::new("black").discrim(),
    ])
    .unwrap();
    let mut config = config();
    config.roles.released = Some("released".to_string());
    config.roles.bail_set = Some("bail".to_string());
    config.roles.demographics.race_black = Some("black".to_string());

    let cleaned = clean_dataset(&LabelledFrame::with_meta(df, meta), &catalog, &config).unwrap();
    assert_eq!(cleaned.coercion.action_for("released"), Some(CoercionAction::Decoded));
    assert_eq!(cleaned.rows_dropped, 0);
    assert_eq!(
        outcome_values(&cleaned.frame, "fta").unwrap(),
        vec![true, false, false, true, false, true]
    );

    let released = decode_labelled_flags(&cleaned.frame, "released").unwrap();
    assert_eq!(
        released,
        vec![Some(true), Some(true), Some(false), Some(true), Some(false), Some(true)]
    );
    assert!(decode_labelled_flags(&cleaned.frame, "bail")
        .unwrap()
        .iter()
        .all(Option::is_some));

    let profiles =
        derive_profiles(&cleaned.frame, &config.roles.demographics, &config.age_bands).unwrap();
    let black = profiles.iter().filter(|p| p.race == RaceCategory::Black).count();
    assert_eq!(black, 3);

    // Released rows only: two missed FTAs, one correct and one needless bail
    let judges = evaluate(&cleaned.frame, &[], &config).unwrap().judges.unwrap();
    assert_eq!(judges.overall.total(), 4);
    assert_eq!(judges.overall.true_positive, 1);
    assert_eq!(judges.overall.false_positive, 1);
    assert_eq!(judges.overall.false_negative, 2);
}

#[test]
fn test_sparse_columns_reported() {
    let catalog = Catalog::from_entries(vec![
        CatalogEntry::new("fta").outcome(),
        CatalogEntry::new("score").keep(),
    ])
    .unwrap();
    let mut config = config();
    config.missing_warning = 0.25;

    let cleaned = clean_dataset(&sentinel_frame(), &catalog, &config).unwrap();
    assert_eq!(cleaned.sparse_columns, vec!["score".to_string()]);

    config.missing_warning = 0.5;
    let cleaned = clean_dataset(&sentinel_frame(), &catalog, &config).unwrap();
    assert!(cleaned.sparse_columns.is_empty());
}
