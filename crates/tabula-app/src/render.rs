//! Plain-text rendering of the presented view

use comfy_table::Table;
use tabula_core::Value;
use tabula_grid::{column_letters, CellPosition};
use tabula_services::{StatusLevel, StatusMessage, TableEditor};

/// The presented view as a table, active cell in brackets
pub fn render_view(editor: &TableEditor) -> String {
    let snapshot = editor.snapshot();
    let active = editor.controller().active();

    let mut header = vec![String::new()];
    header.extend(
        snapshot
            .columns()
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} {}", column_letters(i), c.name)),
    );

    let mut table = Table::new();
    table.set_header(header);
    for row in 0..editor.view().len() {
        let mut cells = vec![(row + 1).to_string()];
        for col in 0..snapshot.column_count() {
            let pos = CellPosition::new(row, col);
            let text = editor
                .presented_value(pos)
                .map(Value::to_string)
                .unwrap_or_default();
            cells.push(if active == Some(pos) {
                format!("[{text}]")
            } else {
                text
            });
        }
        table.add_row(cells);
    }
    table.to_string()
}

pub fn render_status(status: &StatusMessage) -> String {
    let level = match status.level {
        StatusLevel::Info => "info",
        StatusLevel::Warning => "warning",
        StatusLevel::Error => "error",
    };
    format!("{level}: {}", status.text)
}
