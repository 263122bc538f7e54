//! Descriptive statistics, model evaluation and the judge proxy.

pub mod descriptive;
pub mod evaluate;
pub mod judge;
pub mod metrics;

pub use descriptive::{describe, DecisionColumns, DescriptiveStats, GroupStats};
pub use evaluate::{evaluate_judges, evaluate_variant, JudgeEvaluation, VariantEvaluation};
pub use judge::{classify_decision, JudgeCase, JudgeOutcome, JudgeTally};
pub use metrics::ClassificationMetrics;
