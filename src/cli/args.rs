//! Command-line argument definitions using clap

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{ConfigError, PipelineConfig, RoleColumns};
use crate::model::search::{SearchConfig, SearchGrid, SelectionMetric};
use crate::pipeline::coerce::DEFAULT_NOT_APPLICABLE;
use crate::pipeline::demographics::{AgeBands, DemographicColumns};
use crate::pipeline::sentinel::SentinelPolicy;
use crate::pipeline::target::TargetMapping;

/// fta-equity - Clean pretrial release data and audit failure-to-appear models for equity
#[derive(Parser, Debug)]
#[command(name = "fta-equity")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Show debug diagnostics on stderr
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clean the data, train full and fair models, and write the equity report
    Run(RunArgs),

    /// Clean the data and write cleaned.parquet only
    Clean(CleanArgs),

    /// Re-evaluate saved model artifacts against a cleaned table
    Evaluate(EvaluateArgs),
}

/// Columns with a fixed meaning in the analysis.
#[derive(Args, Debug, Clone)]
pub struct RoleArgs {
    /// Failure-to-appear outcome column
    #[arg(long, default_value = "fta")]
    pub outcome: String,

    /// Value in the outcome column meaning FTA (maps to true).
    /// Required with --non-event-value when the outcome is not 0/1 or yes/no.
    #[arg(long, requires = "non_event_value")]
    pub event_value: Option<String>,

    /// Value in the outcome column meaning the defendant appeared (maps to false)
    #[arg(long, requires = "event_value")]
    pub non_event_value: Option<String>,

    /// Column flagging whether the defendant was released
    #[arg(long)]
    pub released: Option<String>,

    /// Column flagging whether bail was set
    #[arg(long)]
    pub bail_set: Option<String>,

    /// Column holding the bail amount
    #[arg(long)]
    pub bail_amount: Option<String>,

    /// Gender column
    #[arg(long)]
    pub gender: Option<String>,

    /// Age column (years)
    #[arg(long)]
    pub age: Option<String>,

    /// Flag column for White defendants
    #[arg(long)]
    pub race_white: Option<String>,

    /// Flag column for Black defendants
    #[arg(long)]
    pub race_black: Option<String>,

    /// Flag column for Latinx defendants
    #[arg(long)]
    pub latinx: Option<String>,

    /// Lower edges of the age bands (comma-separated, increasing)
    #[arg(long, value_delimiter = ',', default_values_t = [18u32, 25, 35, 45, 55])]
    pub age_edges: Vec<u32>,
}

/// Input files and cleaning settings.
#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    /// Input dataset (.dta, .csv or .parquet)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Variable catalog (.csv or .json)
    #[arg(short, long)]
    pub catalog: PathBuf,

    /// Directory for cleaned data, models and the report
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub roles: RoleArgs,

    /// Columns whose sentinel pass also treats repeated 8s as missing (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub strict_sentinels: Vec<String>,

    /// Columns never recoded for sentinels, such as amounts where 999 is real (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub no_sentinel: Vec<String>,

    /// Warn about columns whose missing share exceeds this fraction after cleaning
    #[arg(long, default_value = "0.5", value_parser = validate_fraction)]
    pub missing_warning: f64,

    /// Token treated as missing when deciding whether a text column is numeric
    #[arg(long, default_value = DEFAULT_NOT_APPLICABLE)]
    pub not_applicable: String,
}

/// Model training settings.
#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Random seed for the split, folds and bagging
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Share of each outcome class held out for testing
    #[arg(long, default_value = "0.25", value_parser = validate_fraction)]
    pub test_fraction: f64,

    /// Cross-validation folds
    #[arg(long, default_value = "5")]
    pub folds: usize,

    /// Worker threads for the grid search (default: available cores)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Largest tree count in the grid
    #[arg(long, default_value = "2500")]
    pub trees_max: usize,

    /// Tree count step in the grid
    #[arg(long, default_value = "100")]
    pub trees_step: usize,

    /// Interaction depths to search (comma-separated)
    #[arg(long, value_delimiter = ',', default_values_t = [2usize, 3, 4])]
    pub depths: Vec<usize>,

    /// Shrinkage values to search (comma-separated)
    #[arg(long, value_delimiter = ',', default_values_t = [0.025f64, 0.05, 0.1])]
    pub shrinkages: Vec<f64>,

    /// Minimum observations per leaf
    #[arg(long, default_value = "20")]
    pub min_leaf: usize,

    /// Share of training rows sampled for each tree
    #[arg(long, default_value = "0.5")]
    pub bag_fraction: f64,

    /// Cross-validation score used to select hyperparameters
    #[arg(long, value_enum, default_value_t = SelectionMetric::Accuracy)]
    pub metric: SelectionMetric,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub clean: CleanArgs,

    #[command(flatten)]
    pub train: TrainArgs,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    /// Cleaned table written by `run` or `clean`
    #[arg(long)]
    pub cleaned: Option<PathBuf>,

    /// Directory containing model_full.bin and model_fair.bin
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub roles: RoleArgs,
}

impl RoleArgs {
    fn role_columns(&self) -> RoleColumns {
        RoleColumns {
            outcome: self.outcome.clone(),
            released: self.released.clone(),
            bail_set: self.bail_set.clone(),
            bail_amount: self.bail_amount.clone(),
            demographics: DemographicColumns {
                gender: self.gender.clone(),
                age: self.age.clone(),
                race_white: self.race_white.clone(),
                race_black: self.race_black.clone(),
                latinx: self.latinx.clone(),
            },
        }
    }

    fn mapping(&self) -> Result<Option<TargetMapping>, ConfigError> {
        match (&self.event_value, &self.non_event_value) {
            (Some(event), Some(non_event)) => Ok(Some(TargetMapping::new(event, non_event))),
            (None, None) => Ok(None),
            _ => Err(ConfigError::PartialMapping),
        }
    }

    fn apply(&self, config: &mut PipelineConfig) -> Result<(), ConfigError> {
        config.roles = self.role_columns();
        config.outcome_mapping = self.mapping()?;
        config.age_bands = AgeBands::new(self.age_edges.clone()).ok_or(ConfigError::AgeBands)?;
        Ok(())
    }
}

impl CleanArgs {
    fn base_config(&self) -> Result<PipelineConfig, ConfigError> {
        let mut config = PipelineConfig::new(
            &self.input,
            &self.catalog,
            &self.output_dir,
            &self.roles.outcome,
        );
        self.roles.apply(&mut config)?;
        config.sentinels = SentinelPolicy::default()
            .with_strict(self.strict_sentinels.iter().cloned())
            .with_excluded(self.no_sentinel.iter().cloned());
        config.not_applicable = self.not_applicable.clone();
        config.missing_warning = self.missing_warning;
        Ok(config)
    }
}

impl TrainArgs {
    fn search_config(&self, show_progress: bool) -> SearchConfig {
        let workers = self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        SearchConfig {
            grid: SearchGrid {
                n_trees: SearchGrid::tree_steps(self.trees_max, self.trees_step),
                depths: self.depths.clone(),
                shrinkages: self.shrinkages.clone(),
            },
            n_folds: self.folds,
            min_leaf: self.min_leaf,
            bag_fraction: self.bag_fraction,
            metric: self.metric,
            seed: self.seed,
            ..SearchConfig::default()
        }
        .with_workers(workers)
        .with_progress(show_progress)
    }
}

impl Cli {
    /// Resolve arguments into a validated configuration.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let config = match &self.command {
            Commands::Run(args) => {
                let mut config = args.clean.base_config()?;
                config.seed = args.train.seed;
                config.test_fraction = args.train.test_fraction;
                config.search = args.train.search_config(!self.quiet);
                config
            }
            Commands::Clean(args) => args.base_config()?,
            Commands::Evaluate(args) => {
                let cleaned = args
                    .cleaned
                    .clone()
                    .unwrap_or_else(|| args.output_dir.join("cleaned.parquet"));
                let mut config = PipelineConfig::new(
                    cleaned,
                    PathBuf::new(),
                    &args.output_dir,
                    &args.roles.outcome,
                );
                args.roles.apply(&mut config)?;
                config
            }
        };
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Log filter directive from the verbosity flags.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }
}

/// Validator for fractions strictly between 0 and 1
fn validate_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!("value must be between 0 and 1 (exclusive), got {}", value))
    }
}
