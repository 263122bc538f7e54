//! Report module - summary tables, console rendering and JSON export

pub mod export;
pub mod render;
pub mod sections;
pub mod summary;
pub mod table;

pub use export::{export_report, read_report, Report, ReportMetadata};
pub use render::{display_table, display_tables, format_cell, render_table};
pub use summary::RunSummary;
pub use table::{Cell, SummaryTable};
