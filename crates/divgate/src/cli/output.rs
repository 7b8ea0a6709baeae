//! Table output for CLI commands

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use divgate_mcp::ReviewStatus;

/// Print a table with optional per-cell colors.
pub fn print_table_colored(headers: &[&str], rows: Vec<Vec<(String, Option<Color>)>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        let cells: Vec<Cell> = row
            .into_iter()
            .map(|(text, color)| match color {
                Some(c) => Cell::new(text).fg(c),
                None => Cell::new(text),
            })
            .collect();
        table.add_row(cells);
    }

    println!("{}", table);
}

pub fn status_color(status: ReviewStatus) -> Color {
    match status {
        ReviewStatus::Draft => Color::Grey,
        ReviewStatus::Review => Color::Yellow,
        ReviewStatus::Approved => Color::Blue,
        ReviewStatus::Applied => Color::Green,
        ReviewStatus::RolledBack => Color::DarkGrey,
    }
}
