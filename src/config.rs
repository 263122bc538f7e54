//! Run configuration passed explicitly to every pipeline stage.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::search::SearchConfig;
use crate::pipeline::catalog::{Catalog, CatalogError, ModelVariant};
use crate::pipeline::coerce::DEFAULT_NOT_APPLICABLE;
use crate::pipeline::demographics::{AgeBands, DemographicColumns};
use crate::pipeline::sentinel::SentinelPolicy;
use crate::pipeline::target::TargetMapping;

/// Errors from inconsistent settings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("test fraction must be in (0, 1), got {0}")]
    TestFraction(f64),

    #[error("at least 2 folds are required, got {0}")]
    Folds(usize),

    #[error("the {axis} grid is empty")]
    EmptyGrid { axis: &'static str },

    #[error("bag fraction must be in (0, 1], got {0}")]
    BagFraction(f64),

    #[error("min leaf size must be at least 1")]
    MinLeaf,

    #[error("--event-value and --non-event-value must be given together")]
    PartialMapping,

    #[error("event and non-event values must differ")]
    AmbiguousMapping,

    #[error("age band edges must be non-empty and strictly increasing")]
    AgeBands,
}

/// Columns with a fixed meaning in the analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleColumns {
    pub outcome: String,
    pub released: Option<String>,
    pub bail_set: Option<String>,
    pub bail_amount: Option<String>,
    pub demographics: DemographicColumns,
}

impl RoleColumns {
    /// Every configured non-outcome role as `(role, column)`.
    pub fn named(&self) -> Vec<(&'static str, &str)> {
        let mut roles: Vec<(&'static str, &str)> = [
            ("released", &self.released),
            ("bail-set", &self.bail_set),
            ("bail-amount", &self.bail_amount),
        ]
        .into_iter()
        .filter_map(|(role, column)| column.as_deref().map(|c| (role, c)))
        .collect();
        roles.extend(self.demographics.configured());
        roles
    }

    /// Copy with optional roles whose column is not in `columns` unset.
    pub fn present_in(&self, columns: &[String]) -> RoleColumns {
        let keep = |column: &Option<String>| -> Option<String> {
            let column = column.as_ref()?;
            if columns.contains(column) {
                Some(column.clone())
            } else {
                warn!(column = %column, "Configured role column not in table; ignoring");
                None
            }
        };
        RoleColumns {
            outcome: self.outcome.clone(),
            released: keep(&self.released),
            bail_set: keep(&self.bail_set),
            bail_amount: keep(&self.bail_amount),
            demographics: DemographicColumns {
                gender: keep(&self.demographics.gender),
                age: keep(&self.demographics.age),
                race_white: keep(&self.demographics.race_white),
                race_black: keep(&self.demographics.race_black),
                latinx: keep(&self.demographics.latinx),
            },
        }
    }

    /// Columns kept for evaluation even when they are not model inputs.
    pub fn auxiliary(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for (_, column) in self.named() {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        }
        columns
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub catalog: PathBuf,
    pub output_dir: PathBuf,
    pub roles: RoleColumns,
    pub outcome_mapping: Option<TargetMapping>,
    pub sentinels: SentinelPolicy,
    pub not_applicable: String,
    /// Missing share above which a cleaned column is reported.
    pub missing_warning: f64,
    pub age_bands: AgeBands,
    pub seed: u64,
    pub test_fraction: f64,
    pub search: SearchConfig,
}

impl PipelineConfig {
    /// Defaults for everything except the paths and the outcome column.
    pub fn new(
        input: impl Into<PathBuf>,
        catalog: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        outcome: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            catalog: catalog.into(),
            output_dir: output_dir.into(),
            roles: RoleColumns {
                outcome: outcome.into(),
                ..Default::default()
            },
            outcome_mapping: None,
            sentinels: SentinelPolicy::default(),
            not_applicable: DEFAULT_NOT_APPLICABLE.to_string(),
            missing_warning: 0.5,
            age_bands: AgeBands::default(),
            seed: 42,
            test_fraction: 0.25,
            search: SearchConfig::default(),
        }
    }

    /// Check value ranges that do not depend on the data.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ConfigError::TestFraction(self.test_fraction));
        }
        if self.search.n_folds < 2 {
            return Err(ConfigError::Folds(self.search.n_folds));
        }
        let grid = &self.search.grid;
        for (axis, empty) in [
            ("n_trees", grid.n_trees.is_empty()),
            ("depth", grid.depths.is_empty()),
            ("shrinkage", grid.shrinkages.is_empty()),
        ] {
            if empty {
                return Err(ConfigError::EmptyGrid { axis });
            }
        }
        if !(self.search.bag_fraction > 0.0 && self.search.bag_fraction <= 1.0) {
            return Err(ConfigError::BagFraction(self.search.bag_fraction));
        }
        if self.search.min_leaf == 0 {
            return Err(ConfigError::MinLeaf);
        }
        if let Some(mapping) = &self.outcome_mapping {
            if mapping.event_value == mapping.non_event_value {
                return Err(ConfigError::AmbiguousMapping);
            }
        }
        Ok(())
    }

    /// Check role columns against the catalog.
    pub fn validate_catalog(&self, catalog: &Catalog) -> Result<(), CatalogError> {
        catalog.check_roles(&self.roles.outcome, &self.roles.named())
    }

    pub fn cleaned_path(&self) -> PathBuf {
        self.output_dir.join("cleaned.parquet")
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join("report.json")
    }

    pub fn artifact_path(&self, variant: ModelVariant) -> PathBuf {
        self.output_dir.join(variant.artifact_file_name())
    }
}

/// Artifact path for `variant` inside `dir`.
pub fn artifact_path_in(dir: &Path, variant: ModelVariant) -> PathBuf {
    dir.join(variant.artifact_file_name())
}
