//! Tab/newline-delimited clipboard text

use crate::selection::{CellPosition, CellRegion};

/// Serialize cells row-major: tabs between columns, newlines between rows.
pub fn to_tsv(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| row.join("\t"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read text copied from this grid or a spreadsheet. Accepts `\r\n` line
/// endings and ignores one trailing line break.
pub fn parse_tsv(text: &str) -> Vec<Vec<String>> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let body = normalized.strip_suffix('\n').unwrap_or(&normalized);
    if body.is_empty() {
        return Vec::new();
    }
    body.split('\n')
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}

/// Collect a region's text with `value_at(position)` and serialize it.
pub fn copy_region(region: CellRegion, mut value_at: impl FnMut(CellPosition) -> String) -> String {
    let rows: Vec<Vec<String>> = (region.start_row..=region.end_row)
        .map(|row| {
            (region.start_col..=region.end_col)
                .map(|col| value_at(CellPosition::new(row, col)))
                .collect()
        })
        .collect();
    to_tsv(&rows)
}

/// Cell writes produced by pasting text at an anchor
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PastePlan {
    pub writes: Vec<(CellPosition, String)>,
    /// Values that fell outside the grid
    pub clipped: usize,
}

impl PastePlan {
    /// Lay `text` out from `anchor` inside a `rows x cols` grid.
    pub fn new(text: &str, anchor: CellPosition, rows: usize, cols: usize) -> Self {
        let mut plan = PastePlan::default();
        for (dr, line) in parse_tsv(text).into_iter().enumerate() {
            for (dc, value) in line.into_iter().enumerate() {
                let row = anchor.row + dr;
                let col = anchor.col + dc;
                if row < rows && col < cols {
                    plan.writes.push((CellPosition::new(row, col), value));
                } else {
                    plan.clipped += 1;
                }
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}
