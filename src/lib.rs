//! fta-equity: pretrial failure-to-appear modelling with an equity audit
//!
//! Cleans a pretrial release dataset (sentinel missing codes, value labels,
//! type coercion), trains a full and a demographically blind gradient-boosted
//! classifier, and compares their accuracy per gender, age band and race
//! with the implicit predictions of bail decisions.

pub mod cli;
pub mod config;
pub mod equity;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod study;
pub mod utils;

pub use config::PipelineConfig;
pub use error::{Stage, StageError};
