//! End-to-end tests of the fta-equity binary

use assert_cmd::Command;
use clap::Parser;
use fta_equity::cli::{Cli, Commands};
use fta_equity::report::read_report;
use predicates::prelude::*;

#[path = "common/mod.rs"]
mod common;

use common::PretrialFixture;

const ROLE_FLAGS: [&str; 16] = [
    "--released",
    "released",
    "--bail-set",
    "bail_set",
    "--bail-amount",
    "bail_amount",
    "--gender",
    "sex",
    "--age",
    "age",
    "--race-white",
    "race_white",
    "--race-black",
    "race_black",
    "--latinx",
    "latinx",
];

const TINY_GRID: [&str; 14] = [
    "--trees-max",
    "20",
    "--trees-step",
    "10",
    "--depths",
    "1,2",
    "--shrinkages",
    "0.1",
    "--folds",
    "2",
    "--min-leaf",
    "5",
    "--workers",
    "2",
];

fn fta_equity() -> Command {
    Command::cargo_bin("fta-equity").unwrap()
}

fn run_command(fixture: &PretrialFixture) -> Command {
    let mut cmd = fta_equity();
    cmd.arg("run")
        .arg("-i")
        .arg(&fixture.data)
        .arg("-c")
        .arg(&fixture.catalog)
        .arg("-o")
        .arg(fixture.output_dir())
        .args(ROLE_FLAGS)
        .args(TINY_GRID);
    cmd
}

#[test]
fn test_run_writes_every_artifact() {
    let fixture = PretrialFixture::new(300, 21);
    run_command(&fixture)
        .assert()
        .success()
        .stdout(predicate::str::contains("fta-equity run complete!"));

    let out = fixture.output_dir();
    for file in [
        "cleaned.parquet",
        "cleaned.labels.json",
        "model_full.bin",
        "model_fair.bin",
        "report.json",
    ] {
        assert!(out.join(file).exists(), "{} was not written", file);
    }

    let report = read_report(&out.join("report.json")).unwrap();
    assert_eq!(report.metadata.seed, 42);
    assert_eq!(report.metadata.rows_analyzed, 300);
    assert_eq!(report.metadata.selection_metric, "accuracy");
    assert!(!report.tables.is_empty());
}

#[test]
fn test_evaluate_reuses_saved_models() {
    let fixture = PretrialFixture::new(300, 22);
    run_command(&fixture)
        .args(["--seed", "9", "--test-fraction", "0.3"])
        .assert()
        .success();

    let report_path = fixture.output_dir().join("report.json");
    std::fs::remove_file(&report_path).unwrap();

    fta_equity()
        .arg("evaluate")
        .arg("-o")
        .arg(fixture.output_dir())
        .args(ROLE_FLAGS)
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded full model"));

    // Settings are read back from the artifacts, not the evaluate defaults
    let report = read_report(&report_path).unwrap();
    assert_eq!(report.metadata.seed, 9);
    assert_eq!(report.metadata.test_fraction, 0.3);
}

#[test]
fn test_evaluate_without_models_fails() {
    let fixture = PretrialFixture::new(100, 23);
    fta_equity()
        .arg("clean")
        .arg("-i")
        .arg(&fixture.data)
        .arg("-c")
        .arg(&fixture.catalog)
        .arg("-o")
        .arg(fixture.output_dir())
        .args(ROLE_FLAGS)
        .assert()
        .success();
    assert!(fixture.output_dir().join("cleaned.parquet").exists());
    assert!(!fixture.output_dir().join("model_full.bin").exists());

    fta_equity()
        .arg("evaluate")
        .arg("-o")
        .arg(fixture.output_dir())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No model artifacts"));
}

#[test]
fn test_unflagged_outcome_reports_clean_stage() {
    let fixture = PretrialFixture::new(60, 24);
    let mut cmd = run_command(&fixture);
    cmd.args(["--outcome", "priors"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("clean stage failed"))
        .stderr(predicate::str::contains("not flagged as an outcome"));
}

#[test]
fn test_missing_input_argument() {
    fta_equity()
        .args(["run", "-c", "catalog.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--input"));
}

#[test]
fn test_invalid_test_fraction() {
    let fixture = PretrialFixture::new(20, 25);
    run_command(&fixture)
        .args(["--test-fraction", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 0 and 1"));
}

#[test]
fn test_verbose_and_quiet_conflict() {
    assert!(Cli::try_parse_from(["fta-equity", "-v", "-q", "evaluate"]).is_err());
}

#[test]
fn test_clean_subcommand_parses_roles() {
    let cli = Cli::parse_from([
        "fta-equity",
        "clean",
        "-i",
        "pretrial.dta",
        "-c",
        "catalog.csv",
        "--gender",
        "sex",
        "--age-edges",
        "21,30,50",
    ]);
    let Commands::Clean(args) = &cli.command else {
        panic!("expected clean subcommand");
    };
    assert_eq!(args.roles.gender.as_deref(), Some("sex"));

    let config = cli.pipeline_config().unwrap();
    assert_eq!(config.age_bands.labels(), vec!["Under 21", "21-29", "30-49", "50+"]);
    assert_eq!(config.roles.demographics.gender.as_deref(), Some("sex"));
}

#[test]
fn test_unsorted_age_edges_rejected() {
    let cli = Cli::parse_from([
        "fta-equity", "clean", "-i", "d.csv", "-c", "c.csv", "--age-edges", "30,20",
    ]);
    assert!(cli.pipeline_config().is_err());
}
