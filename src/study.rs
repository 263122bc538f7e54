//! Stage orchestration: clean, partition, train and evaluate.
//!
//! Each function returns a [`StageError`] naming the stage that failed. The
//! binary adds console output around these calls; nothing here prints.

use anyhow::{anyhow, Context};
use chrono::Utc;
use tracing::{info, instrument};

use crate::config::{PipelineConfig, RoleColumns};
use crate::equity::descriptive::{describe, DecisionColumns, DescriptiveStats};
use crate::equity::evaluate::{
    evaluate_judges, evaluate_variant, JudgeEvaluation, VariantEvaluation,
};
use crate::equity::judge::JudgeCase;
use crate::error::{Stage, StageContext, StageError};
use crate::model::artifact::ModelArtifact;
use crate::model::train::train_variant;
use crate::pipeline::catalog::{Catalog, ModelVariant, Schema};
use crate::pipeline::clean::{clean_dataset, CleanedData};
use crate::pipeline::demographics::{derive_profiles, DemographicProfile};
use crate::pipeline::features::FeatureSchema;
use crate::pipeline::frame::{column_as_bools, column_as_f64, LabelledFrame};
use crate::pipeline::loader::load_dataset;
use crate::pipeline::partition::{stratified_split, Split};
use crate::pipeline::target::decode_labelled_flags;
use crate::report::export::{Report, ReportMetadata};
use crate::report::sections;
use crate::report::table::SummaryTable;

/// Load the catalog, check it against the configured roles, load the
/// dataset and clean it.
#[instrument(skip_all, fields(input = %config.input.display()))]
pub fn run_cleaning(config: &PipelineConfig) -> Result<(Catalog, CleanedData), StageError> {
    let catalog = Catalog::load(&config.catalog).in_stage(Stage::Clean)?;
    config.validate_catalog(&catalog).in_stage(Stage::Clean)?;
    let raw = load_dataset(&config.input).in_stage(Stage::Clean)?;
    let cleaned = clean_dataset(&raw, &catalog, config).in_stage(Stage::Clean)?;
    Ok((catalog, cleaned))
}

/// Outcome values of a cleaned table. Cleaning guarantees none are missing.
pub fn outcome_values(frame: &LabelledFrame, outcome: &str) -> anyhow::Result<Vec<bool>> {
    column_as_bools(&frame.df, outcome)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| v.ok_or_else(|| anyhow!("Outcome '{}' is missing at row {}", outcome, row)))
        .collect()
}

/// Stratified train/test split of the cleaned table.
pub fn partition(frame: &LabelledFrame, config: &PipelineConfig) -> Result<Split, StageError> {
    let outcome = outcome_values(frame, &config.roles.outcome).in_stage(Stage::Partition)?;
    stratified_split(&outcome, config.test_fraction, config.seed).in_stage(Stage::Partition)
}

/// Fit one variant on the training rows and package the artifact.
#[instrument(skip_all, fields(variant = variant.name()))]
pub fn train_model(
    frame: &LabelledFrame,
    schema: &Schema,
    split: &Split,
    variant: ModelVariant,
    config: &PipelineConfig,
) -> Result<ModelArtifact, StageError> {
    let feature_columns = schema.feature_columns(variant);
    let train = frame.take(&split.train).in_stage(Stage::Train)?;
    let test = frame.take(&split.test).in_stage(Stage::Train)?;

    let features =
        FeatureSchema::fit(&[&train.df, &test.df], &feature_columns).in_stage(Stage::Train)?;
    let x_train = features.encode(&train.df).in_stage(Stage::Train)?;
    let x_test = features.encode(&test.df).in_stage(Stage::Train)?;
    let y_train = outcome_values(&train, &config.roles.outcome).in_stage(Stage::Train)?;
    let y_test = outcome_values(&test, &config.roles.outcome).in_stage(Stage::Train)?;

    info!(
        sources = feature_columns.len(),
        features = x_train.n_features(),
        "Encoded feature matrices"
    );
    let model = train_variant(&x_train, &y_train, &x_test, &config.search).in_stage(Stage::Train)?;

    Ok(ModelArtifact {
        variant,
        seed: config.seed,
        test_fraction: config.test_fraction,
        split: split.clone(),
        schema: features,
        feature_columns,
        x_train,
        y_train,
        x_test,
        y_test,
        model,
        created_at: Utc::now().to_rfc3339(),
    })
}

/// Evaluation results for a set of artifacts.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub descriptive: DescriptiveStats,
    pub variants: Vec<VariantEvaluation>,
    /// `None` unless both release and bail columns are configured.
    pub judges: Option<JudgeEvaluation>,
}

fn optional_flags(
    frame: &LabelledFrame,
    column: Option<&str>,
) -> anyhow::Result<Vec<Option<bool>>> {
    match column {
        Some(c) => decode_labelled_flags(frame, c),
        None => Ok(vec![None; frame.height()]),
    }
}

fn decision_columns(frame: &LabelledFrame, roles: &RoleColumns) -> anyhow::Result<DecisionColumns> {
    Ok(DecisionColumns {
        released: optional_flags(frame, roles.released.as_deref())?,
        bail_set: optional_flags(frame, roles.bail_set.as_deref())?,
        bail_amount: match roles.bail_amount.as_deref() {
            Some(c) => column_as_f64(&frame.df, c)
                .with_context(|| format!("Bail amount column '{}' is not numeric", c))?,
            None => vec![None; frame.height()],
        },
    })
}

/// Descriptive statistics, per-variant test-set metrics and the judge proxy.
#[instrument(skip_all, fields(rows = frame.height(), artifacts = artifacts.len()))]
pub fn evaluate(
    frame: &LabelledFrame,
    artifacts: &[ModelArtifact],
    config: &PipelineConfig,
) -> Result<Evaluation, StageError> {
    let roles = config.roles.present_in(&frame.column_names());
    let profiles = derive_profiles(frame, &roles.demographics, &config.age_bands)
        .in_stage(Stage::Evaluate)?;
    let decisions = decision_columns(frame, &roles).in_stage(Stage::Evaluate)?;
    let descriptive = describe(&decisions, &profiles, &config.age_bands);

    let mut variants = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        if let Some(&row) = artifact.split.test.iter().find(|&&r| r >= profiles.len()) {
            return Err(StageError::new(
                Stage::Evaluate,
                anyhow!(
                    "{} artifact refers to row {} but the table has {} rows",
                    artifact.variant,
                    row,
                    profiles.len()
                ),
            ));
        }
        let test_profiles: Vec<DemographicProfile> =
            artifact.split.test.iter().map(|&r| profiles[r].clone()).collect();
        let evaluation = evaluate_variant(
            artifact.variant,
            &artifact.model.test_probabilities,
            &artifact.y_test,
            &test_profiles,
            &config.age_bands,
        )
        .in_stage(Stage::Evaluate)?;
        variants.push(evaluation);
    }

    let judges = if roles.released.is_some() && roles.bail_set.is_some() {
        let outcome = outcome_values(frame, &roles.outcome).in_stage(Stage::Evaluate)?;
        let cases: Vec<JudgeCase> = (0..frame.height())
            .map(|i| JudgeCase {
                released: decisions.released[i],
                bail_set: decisions.bail_set[i],
                failed_to_appear: Some(outcome[i]),
            })
            .collect();
        Some(evaluate_judges(&cases, &profiles, &config.age_bands))
    } else {
        None
    };

    Ok(Evaluation {
        descriptive,
        variants,
        judges,
    })
}

/// Assemble every summary table into a report.
pub fn build_report(
    metadata: ReportMetadata,
    cleaned: Option<&CleanedData>,
    artifacts: &[ModelArtifact],
    evaluation: &Evaluation,
) -> Report {
    let mut tables: Vec<SummaryTable> = Vec::new();
    if let Some(cleaned) = cleaned {
        tables.push(sections::sentinel_table(&cleaned.sentinels));
        tables.push(sections::coercion_table(&cleaned.coercion));
        tables.push(sections::missing_table(&cleaned.missing));
    }
    tables.extend(sections::descriptive_tables(&evaluation.descriptive));
    if !artifacts.is_empty() {
        tables.push(sections::model_selection_table(&artifacts.iter().collect::<Vec<_>>()));
    }
    tables.extend(sections::equity_tables(&evaluation.variants.iter().collect::<Vec<_>>()));
    if let Some(judges) = &evaluation.judges {
        tables.extend(sections::judge_tables(judges));
    }
    Report { metadata, tables }
}
