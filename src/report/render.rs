//! Console rendering of summary tables.

use comfy_table::{
    presets::UTF8_FULL_CONDENSED, Attribute, Cell as TableCell, CellAlignment, Color, Table,
};
use console::style;

use super::table::{Cell, SummaryTable};

/// Text shown for a missing cell.
pub const MISSING_MARK: &str = "NA";

/// Format one cell: ratios as percentages, amounts with two decimals.
pub fn format_cell(cell: &Cell) -> String {
    match cell {
        Cell::Text(text) => text.clone(),
        Cell::Count(n) => n.to_string(),
        Cell::Ratio(r) => format!("{:.1}%", r * 100.0),
        Cell::Amount(a) => format!("{:.2}", a),
        Cell::Missing => MISSING_MARK.to_string(),
    }
}

pub fn render_table(table: &SummaryTable) -> Table {
    let mut rendered = Table::new();
    rendered.load_preset(UTF8_FULL_CONDENSED);
    rendered.set_header(
        table
            .columns
            .iter()
            .map(|c| TableCell::new(c).add_attribute(Attribute::Bold)),
    );

    for row in &table.rows {
        rendered.add_row(row.iter().map(|cell| {
            let text = TableCell::new(format_cell(cell));
            match cell {
                Cell::Text(_) => text,
                Cell::Missing => text.fg(Color::DarkGrey).set_alignment(CellAlignment::Right),
                _ => text.set_alignment(CellAlignment::Right),
            }
        }));
    }
    rendered
}

/// Print a table under a section heading, indented like the step output.
pub fn display_table(table: &SummaryTable) {
    println!();
    println!("    {}", style(table.title.to_uppercase()).white().bold());
    println!("    {}", style("─".repeat(50)).dim());

    if table.is_empty() {
        println!("    {}", style("(no rows)").dim());
        return;
    }
    for line in render_table(table).to_string().lines() {
        println!("    {}", line);
    }
}

pub fn display_tables(tables: &[SummaryTable]) {
    for table in tables {
        display_table(table);
    }
}
