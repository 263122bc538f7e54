//! Terminal styling for step-by-step console output

use std::path::Path;
use std::time::Duration;

use console::{style, Emoji};

use crate::config::PipelineConfig;

// Emoji icons with fallbacks for terminals that don't support them
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
pub static BOOK: Emoji<'_, '_> = Emoji("📖 ", "");
pub static TREE: Emoji<'_, '_> = Emoji("🌲 ", "");
pub static SCALES: Emoji<'_, '_> = Emoji("⚖️  ", "");

/// Print the application banner
pub fn print_banner(version: &str) {
    println!();
    println!(
        "    {} {}",
        style("fta-equity").cyan().bold(),
        style(format!("v{}", version)).dim()
    );
    println!(
        "    {}",
        style("Pretrial failure-to-appear models, audited for equity").dim()
    );
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Print the configuration card
pub fn print_config(config: &PipelineConfig) {
    let box_width = 56;
    let line = "─".repeat(box_width - 2);

    println!("    ┌{}┐", line);
    println!(
        "    │ {:<width$}│",
        style("⚙️  Configuration").cyan().bold(),
        width = box_width - 3
    );
    println!("    ├{}┤", line);
    println!("    │  {}Input:   {:<40}│", FOLDER, truncate_path(&config.input, 39));
    if !config.catalog.as_os_str().is_empty() {
        println!("    │  {}Catalog: {:<40}│", BOOK, truncate_path(&config.catalog, 39));
    }
    println!("    │  {}Outcome: {:<40}│", TARGET, truncate_string(&config.roles.outcome, 39));
    println!("    │  {}Output:  {:<40}│", SAVE, truncate_path(&config.output_dir, 39));
    println!("    ├{}┤", line);

    let grid = &config.search.grid;
    let grid_text = format!(
        "{} combos x {} folds",
        grid.len(),
        config.search.n_folds
    );
    println!(
        "    │  {}Grid:    {:<40}│",
        TREE,
        style(truncate_string(&grid_text, 39)).yellow()
    );
    println!(
        "    │  {}Metric:  {:<40}│",
        SCALES,
        style(config.search.metric.name()).yellow()
    );
    println!("    └{}┘", line);
    println!();
}

/// Print a step header with styling
pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("    {} {}", style("⚠").yellow().bold(), style(message).yellow());
}

pub fn print_step_time(elapsed: Duration) {
    println!("    {}", style(format!("({:.2}s)", elapsed.as_secs_f64())).dim());
}

/// Print the final completion message
pub fn print_completion() {
    println!();
    println!(
        "    {} {}",
        ROCKET,
        style("fta-equity run complete!").green().bold()
    );
    println!();
}

/// Print a styled count message
pub fn print_count(description: &str, count: usize, detail: Option<&str>) {
    match detail {
        Some(detail) => println!(
            "      Found {} {} {}",
            style(count).yellow().bold(),
            description,
            style(detail).dim()
        ),
        None => println!("      Found {} {}", style(count).yellow().bold(), description),
    }
}

fn truncate_path(path: &Path, max_len: usize) -> String {
    truncate_string(&path.display().to_string(), max_len)
}

/// Keep the tail of `s` so it fits in `max_len` characters.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    let len = s.chars().count();
    if len <= max_len {
        return s.to_string();
    }
    let tail: String = s.chars().skip(len + 3 - max_len).collect();
    format!("...{}", tail)
}
