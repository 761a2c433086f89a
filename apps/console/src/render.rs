//! Plain-text rendering of a `TableView`.

use client_core::{view_model::ColumnState, SortDirection, TableView};
use shared::validation::FieldViolation;

fn heading(column: &ColumnState) -> String {
    let mut title = column.title.to_string();
    match column.sort_order {
        Some(SortDirection::Ascending) => title.push_str(" ^"),
        Some(SortDirection::Descending) => title.push_str(" v"),
        None => {}
    }
    if column.filtered {
        title.push_str(" *");
    }
    title
}

pub fn render_table(view: &TableView) -> String {
    if view.loading {
        return "loading recipients...\n".to_string();
    }

    let mut grid: Vec<Vec<String>> = Vec::with_capacity(view.rows.len() + 1);
    let mut header = vec!["ID".to_string()];
    header.extend(view.columns.iter().map(heading));
    grid.push(header);
    for row in &view.rows {
        let marker = if row.editing { "*" } else { "" };
        let mut cells = vec![format!("{}{marker}", row.record.recipient_id)];
        cells.extend(
            view.columns
                .iter()
                .map(|column| row.record.display_value(column.field)),
        );
        grid.push(cells);
    }

    let widths: Vec<usize> = (0..grid[0].len())
        .map(|i| grid.iter().map(|cells| cells[i].chars().count()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for cells in &grid {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }

    let revision = view
        .revision
        .map(|revision| revision.to_string())
        .unwrap_or_default();
    out.push_str(&format!(
        "{} of {} recipients at {revision}",
        view.visible, view.total
    ));
    if view.stale {
        out.push_str(" (stale: last refresh failed)");
    }
    out.push('\n');
    out
}

pub fn render_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|violation| format!("  {violation}\n"))
        .collect()
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
