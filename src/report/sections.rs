//! Summary tables built from pipeline results.

use super::table::{Cell, SummaryTable};
use crate::equity::descriptive::{DescriptiveStats, GroupStats};
use crate::equity::evaluate::{JudgeEvaluation, VariantEvaluation};
use crate::equity::judge::JudgeTally;
use crate::equity::metrics::ClassificationMetrics;
use crate::model::artifact::ModelArtifact;
use crate::pipeline::coerce::{CoercionAction, CoercionReport};
use crate::pipeline::demographics::Dimension;
use crate::pipeline::frame::format_number;
use crate::pipeline::sentinel::SentinelReport;

/// Columns with at least one missing value, most missing first.
pub fn missing_table(ratios: &[(String, f64)]) -> SummaryTable {
    let mut table = SummaryTable::new("Missing values after cleaning", ["Column", "Missing"]);
    for (column, ratio) in ratios.iter().filter(|(_, r)| *r > 0.0) {
        table.push_row(vec![Cell::text(column), Cell::Ratio(*ratio)]);
    }
    table
}

/// Columns where sentinel codes were found.
pub fn sentinel_table(reports: &[SentinelReport]) -> SummaryTable {
    let mut table = SummaryTable::new(
        "Sentinel codes recoded to missing",
        ["Column", "Digits", "Codes", "Recoded"],
    );
    for report in reports.iter().filter(|r| r.recoded > 0) {
        let codes = report
            .candidates
            .iter()
            .map(|&c| format_number(c))
            .collect::<Vec<_>>()
            .join(", ");
        table.push_row(vec![
            Cell::text(&report.column),
            report.width.map_or(Cell::Missing, |w| Cell::Count(w as usize)),
            Cell::Text(codes),
            Cell::Count(report.recoded),
        ]);
    }
    table
}

pub fn coercion_table(report: &CoercionReport) -> SummaryTable {
    let mut table = SummaryTable::new("Type coercion", ["Action", "Columns"]);
    for (label, action) in [
        ("Decoded value labels", CoercionAction::Decoded),
        ("Converted to numeric", CoercionAction::Numeric),
        ("Kept categorical", CoercionAction::Categorical),
        ("Unchanged", CoercionAction::Unchanged),
    ] {
        table.push_row(vec![Cell::text(label), Cell::Count(report.count(action))]);
    }
    table
}

fn stats_row(stats: &GroupStats) -> Vec<Cell> {
    vec![
        Cell::text(&stats.category),
        Cell::Count(stats.n),
        Cell::ratio(stats.release_rate),
        Cell::ratio(stats.bail_set_rate),
        Cell::amount(stats.mean_bail),
        Cell::amount(stats.median_bail),
    ]
}

/// One table per dimension, each ending with the overall row.
pub fn descriptive_tables(stats: &DescriptiveStats) -> Vec<SummaryTable> {
    stats
        .by_dimension
        .iter()
        .map(|(dimension, groups)| {
            let mut table = SummaryTable::new(
                format!("Release and bail by {}", dimension.title().to_lowercase()),
                [
                    dimension.title(),
                    "N",
                    "Released",
                    "Bail set",
                    "Mean bail",
                    "Median bail",
                ],
            );
            for group in groups {
                table.push_row(stats_row(group));
            }
            table.push_row(stats_row(&stats.overall));
            table
        })
        .collect()
}

/// Selected hyperparameters and cross-validated score per variant.
pub fn model_selection_table(artifacts: &[&ModelArtifact]) -> SummaryTable {
    let mut table = SummaryTable::new(
        "Model selection",
        [
            "Model", "Trees", "Depth", "Shrinkage", "Metric", "CV score", "Train", "Test",
        ],
    );
    for artifact in artifacts {
        let search = &artifact.model.search;
        table.push_row(vec![
            Cell::text(artifact.variant.name()),
            Cell::Count(search.best.n_trees),
            Cell::Count(search.best.interaction_depth),
            Cell::Text(format_number(search.best.shrinkage)),
            Cell::text(search.metric.name()),
            Cell::ratio(Some(search.best.mean_score)),
            Cell::Count(artifact.n_train()),
            Cell::Count(artifact.n_test()),
        ]);
    }
    table
}

fn metric_cells(metrics: Option<&ClassificationMetrics>) -> [Cell; 3] {
    match metrics {
        Some(m) => [
            Cell::Ratio(m.accuracy),
            Cell::ratio(m.auc),
            Cell::Ratio(m.mean_probability),
        ],
        None => [Cell::Missing, Cell::Missing, Cell::Missing],
    }
}

/// Side-by-side full and fair model metrics per category of each dimension.
///
/// Categories are taken from the first evaluation; a category absent from
/// another evaluation shows missing cells.
pub fn equity_tables(evaluations: &[&VariantEvaluation]) -> Vec<SummaryTable> {
    let Some(first) = evaluations.first() else {
        return Vec::new();
    };

    let mut columns = vec!["Category".to_string(), "N".to_string()];
    for eval in evaluations {
        let name = eval.variant.name();
        columns.push(format!("{name} accuracy"));
        columns.push(format!("{name} AUC"));
        columns.push(format!("{name} mean p"));
    }

    let mut tables = Vec::new();
    for dimension in Dimension::ALL {
        let Some(reference) = first.dimension(dimension) else {
            continue;
        };
        let mut table = SummaryTable::new(
            format!("Model performance by {}", dimension.title().to_lowercase()),
            columns.clone(),
        );
        for group in &reference.groups {
            let mut row = vec![Cell::text(&group.category), Cell::Count(group.metrics.n)];
            for eval in evaluations {
                let metrics = eval
                    .dimension(dimension)
                    .and_then(|d| d.groups.iter().find(|g| g.category == group.category))
                    .map(|g| &g.metrics);
                row.extend(metric_cells(metrics));
            }
            table.push_row(row);
        }
        let mut overall = vec![Cell::text("All"), Cell::Count(first.overall.n)];
        for eval in evaluations {
            overall.extend(metric_cells(Some(&eval.overall)));
        }
        table.push_row(overall);
        tables.push(table);
    }
    tables
}

fn tally_row(category: &str, tally: &JudgeTally) -> Vec<Cell> {
    vec![
        Cell::text(category),
        Cell::Count(tally.total()),
        Cell::ratio(tally.accuracy()),
        Cell::Count(tally.true_positive),
        Cell::Count(tally.false_positive),
        Cell::Count(tally.false_negative),
        Cell::Count(tally.true_negative),
    ]
}

/// Judge proxy contingency counts per category of each dimension.
pub fn judge_tables(judges: &JudgeEvaluation) -> Vec<SummaryTable> {
    judges
        .by_dimension
        .iter()
        .map(|(dimension, tallies)| {
            let mut table = SummaryTable::new(
                format!("Judge decisions by {}", dimension.title().to_lowercase()),
                [dimension.title(), "N", "Accuracy", "TP", "FP", "FN", "TN"],
            );
            for (category, tally) in tallies {
                table.push_row(tally_row(category, tally));
            }
            table.push_row(tally_row("All", &judges.overall));
            table
        })
        .collect()
}
