//! fta-equity: command-line entry point

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

use fta_equity::cli::{Cli, Commands};
use fta_equity::config::{artifact_path_in, PipelineConfig};
use fta_equity::model::ModelArtifact;
use fta_equity::pipeline::coerce::CoercionAction;
use fta_equity::pipeline::{
    estimated_memory_mb, load_labelled_parquet, save_labelled_parquet, CleanedData, ModelVariant,
};
use fta_equity::report::{display_tables, export_report, sections, ReportMetadata, RunSummary};
use fta_equity::study::{build_report, evaluate, partition, run_cleaning, train_model};
use fta_equity::utils::{
    create_spinner, finish_with_success, finish_with_warning, print_banner, print_completion,
    print_config, print_count, print_info, print_step_header, print_step_time, print_success,
    print_warning,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.pipeline_config()?;
    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&config);

    match &cli.command {
        Commands::Run(_) => run(&config),
        Commands::Clean(_) => clean_only(&config),
        Commands::Evaluate(_) => evaluate_saved(&config),
    }
}

fn create_output_dir(config: &PipelineConfig) -> Result<()> {
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })
}

/// Clean, save the cleaned table, and report what cleaning did.
fn clean_step(config: &PipelineConfig, summary: &mut RunSummary) -> Result<CleanedData> {
    print_step_header(1, "Load & Clean");
    let step_start = Instant::now();

    let spinner = create_spinner("Loading and cleaning dataset...");
    let (_, cleaned) = run_cleaning(config)?;
    if cleaned.rows_dropped > 0 {
        finish_with_warning(
            &spinner,
            &format!("Dataset cleaned, {} row(s) without an outcome", cleaned.rows_dropped),
        );
    } else {
        finish_with_success(&spinner, "Dataset cleaned");
    }

    *summary = RunSummary::new(cleaned.rows_loaded, cleaned.columns_loaded);
    summary.rows_analyzed = cleaned.frame.height();
    summary.columns_retained = cleaned.frame.df.width();
    summary.absent_columns = cleaned.schema.absent_columns().to_vec();
    summary.sentinel_columns = cleaned.sentinel_columns();
    summary.sentinel_values = cleaned.sentinel_values();
    summary.decoded_columns = cleaned.coercion.count(CoercionAction::Decoded);
    summary.numeric_columns = cleaned.coercion.count(CoercionAction::Numeric);

    println!("\n    {} Cleaned table:", style("✧").cyan());
    println!("      Rows: {}", cleaned.frame.height());
    println!("      Columns: {}", cleaned.frame.df.width());
    println!(
        "      Estimated memory: {:.2} MB",
        estimated_memory_mb(&cleaned.frame.df)
    );
    if cleaned.rows_dropped > 0 {
        print_count("row(s) with unknown outcome", cleaned.rows_dropped, Some("(dropped)"));
    }
    if !cleaned.sparse_columns.is_empty() {
        print_warning(&format!(
            "{} column(s) more than {:.0}% missing: {}",
            cleaned.sparse_columns.len(),
            config.missing_warning * 100.0,
            cleaned.sparse_columns.join(", ")
        ));
    }
    if !cleaned.schema.absent_columns().is_empty() {
        print_warning(&format!(
            "{} catalog variable(s) not in dataset",
            cleaned.schema.absent_columns().len()
        ));
    }

    create_output_dir(config)?;
    let cleaned_path = config.cleaned_path();
    save_labelled_parquet(&cleaned.frame, &cleaned_path)?;
    print_success(&format!("Saved {}", cleaned_path.display()));

    summary.clean_time = step_start.elapsed();
    print_step_time(summary.clean_time);
    Ok(cleaned)
}

fn run(config: &PipelineConfig) -> Result<()> {
    let mut summary = RunSummary::default();
    let cleaned = clean_step(config, &mut summary)?;

    print_step_header(2, "Partition");
    let step_start = Instant::now();
    let split = partition(&cleaned.frame, config)?;
    print_info(&format!(
        "{} training rows, {} test rows (stratified on {})",
        split.train.len(),
        split.test.len(),
        config.roles.outcome
    ));
    print_step_time(step_start.elapsed());

    print_step_header(3, "Train Models");
    let step_start = Instant::now();
    let mut artifacts = Vec::with_capacity(ModelVariant::ALL.len());
    for variant in ModelVariant::ALL {
        print_info(&format!("Grid search for the {} model", variant));
        let artifact = train_model(&cleaned.frame, &cleaned.schema, &split, variant, config)?;
        let path = config.artifact_path(variant);
        artifact.save(&path)?;

        let search = &artifact.model.search;
        if !search.failed.is_empty() {
            print_warning(&format!(
                "{} hyperparameter combination(s) failed and were skipped",
                search.failed.len()
            ));
        }
        print_success(&format!(
            "{} model: {} trees, depth {}, shrinkage {} (CV {} {:.3}) -> {}",
            variant,
            search.best.n_trees,
            search.best.interaction_depth,
            search.best.shrinkage,
            search.metric.name(),
            search.best.mean_score,
            path.display()
        ));
        artifacts.push(artifact);
    }
    summary.train_time = step_start.elapsed();
    print_step_time(summary.train_time);

    print_step_header(4, "Evaluate");
    let step_start = Instant::now();
    let evaluation = evaluate(&cleaned.frame, &artifacts, config)?;
    for eval in &evaluation.variants {
        let n_features = artifacts
            .iter()
            .find(|a| a.variant == eval.variant)
            .map_or(0, |a| a.x_test.n_features());
        summary
            .models
            .push((eval.variant.to_string(), n_features, eval.overall.accuracy));
    }

    let metadata = ReportMetadata::now(&config.input, &config.catalog)
        .with_settings(config.seed, config.test_fraction, config.search.metric.name())
        .with_rows(cleaned.frame.height());
    let report = build_report(metadata, Some(&cleaned), &artifacts, &evaluation);
    display_tables(&report.tables);

    let report_path = config.report_path();
    export_report(&report, &report_path)?;
    print_success(&format!("Report written to {}", report_path.display()));
    summary.evaluate_time = step_start.elapsed();
    print_step_time(summary.evaluate_time);

    summary.display();
    print_completion();
    Ok(())
}

fn clean_only(config: &PipelineConfig) -> Result<()> {
    let mut summary = RunSummary::default();
    let cleaned = clean_step(config, &mut summary)?;

    display_tables(&[
        sections::sentinel_table(&cleaned.sentinels),
        sections::coercion_table(&cleaned.coercion),
        sections::missing_table(&cleaned.missing),
    ]);
    summary.display();
    print_completion();
    Ok(())
}

fn evaluate_saved(config: &PipelineConfig) -> Result<()> {
    print_step_header(1, "Load Artifacts");
    let step_start = Instant::now();

    let spinner = create_spinner("Loading cleaned table...");
    let frame = load_labelled_parquet(&config.input)?;
    finish_with_success(&spinner, &format!("Loaded {} rows", frame.height()));

    let mut artifacts = Vec::new();
    for variant in ModelVariant::ALL {
        let path = artifact_path_in(&config.output_dir, variant);
        if !path.exists() {
            print_warning(&format!("No {} model at {}", variant, path.display()));
            continue;
        }
        artifacts.push(ModelArtifact::load(&path)?);
        print_success(&format!("Loaded {} model", variant));
    }
    if artifacts.is_empty() {
        anyhow::bail!(
            "No model artifacts found in {}",
            config.output_dir.display()
        );
    }
    print_step_time(step_start.elapsed());

    print_step_header(2, "Evaluate");
    let step_start = Instant::now();
    let evaluation = evaluate(&frame, &artifacts, config)?;
    // Settings come from the training run, not this invocation
    let trained = &artifacts[0];
    let metadata = ReportMetadata::now(&config.input, &config.catalog)
        .with_settings(
            trained.seed,
            trained.test_fraction,
            trained.model.search.metric.name(),
        )
        .with_rows(frame.height());
    let report = build_report(metadata, None, &artifacts, &evaluation);
    display_tables(&report.tables);

    let report_path = config.report_path();
    export_report(&report, &report_path)?;
    print_success(&format!("Report written to {}", report_path.display()));
    print_step_time(step_start.elapsed());

    print_completion();
    Ok(())
}
