//! Cell selection in presented-view coordinates.
//!
//! Positions index the presented (filtered and sorted) view and the visible
//! column order. The editor maps them to [`tabula_core::CellAddress`] values
//! through the current view before touching data.

use std::collections::BTreeSet;

use smallvec::SmallVec;

/// A cell position in the presented view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CellPosition {
    pub row: usize,
    pub col: usize,
}

impl CellPosition {
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// A rectangular region of cells, always stored with sorted bounds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRegion {
    pub start_row: usize,
    pub end_row: usize,
    pub start_col: usize,
    pub end_col: usize,
}

impl CellRegion {
    /// Region spanned by two corners, in either drag direction
    #[inline]
    pub fn new(anchor: CellPosition, end: CellPosition) -> Self {
        Self {
            start_row: anchor.row.min(end.row),
            end_row: anchor.row.max(end.row),
            start_col: anchor.col.min(end.col),
            end_col: anchor.col.max(end.col),
        }
    }

    #[inline]
    pub fn single(pos: CellPosition) -> Self {
        Self::new(pos, pos)
    }

    #[inline]
    pub fn contains(&self, pos: CellPosition) -> bool {
        pos.row >= self.start_row
            && pos.row <= self.end_row
            && pos.col >= self.start_col
            && pos.col <= self.end_col
    }

    #[inline]
    pub fn row_count(&self) -> usize {
        self.end_row - self.start_row + 1
    }

    #[inline]
    pub fn col_count(&self) -> usize {
        self.end_col - self.start_col + 1
    }

    #[inline]
    pub fn top_left(&self) -> CellPosition {
        CellPosition::new(self.start_row, self.start_col)
    }

    /// All cells, row-major
    pub fn iter(&self) -> impl Iterator<Item = CellPosition> + '_ {
        (self.start_row..=self.end_row).flat_map(move |row| {
            (self.start_col..=self.end_col).map(move |col| CellPosition { row, col })
        })
    }
}

/// Current selection shape
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    Cell(CellPosition),
    Range {
        anchor: CellPosition,
        active: CellPosition,
    },
    Rows(BTreeSet<usize>),
    Columns(BTreeSet<usize>),
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::None)
    }

    /// Rectangular bounds for `Cell` and `Range`
    pub fn region(&self) -> Option<CellRegion> {
        match self {
            Selection::Cell(pos) => Some(CellRegion::single(*pos)),
            Selection::Range { anchor, active } => Some(CellRegion::new(*anchor, *active)),
            _ => None,
        }
    }

    /// Rectangles covering the selection inside a `rows x cols` grid.
    /// Row and column sets are split into contiguous runs.
    pub fn regions(&self, rows: usize, cols: usize) -> SmallVec<[CellRegion; 4]> {
        let mut out = SmallVec::new();
        if rows == 0 || cols == 0 {
            return out;
        }
        match self {
            Selection::None => {}
            Selection::Cell(_) | Selection::Range { .. } => {
                if let Some(region) = self.region() {
                    if region.start_row < rows && region.start_col < cols {
                        out.push(CellRegion {
                            end_row: region.end_row.min(rows - 1),
                            end_col: region.end_col.min(cols - 1),
                            ..region
                        });
                    }
                }
            }
            Selection::Rows(set) => {
                for (start, end) in contiguous_runs(set.iter().copied().filter(|r| *r < rows)) {
                    out.push(CellRegion {
                        start_row: start,
                        end_row: end,
                        start_col: 0,
                        end_col: cols - 1,
                    });
                }
            }
            Selection::Columns(set) => {
                for (start, end) in contiguous_runs(set.iter().copied().filter(|c| *c < cols)) {
                    out.push(CellRegion {
                        start_row: 0,
                        end_row: rows - 1,
                        start_col: start,
                        end_col: end,
                    });
                }
            }
        }
        out
    }

    /// Every selected cell inside the grid, row-major within each region
    pub fn cells(&self, rows: usize, cols: usize) -> Vec<CellPosition> {
        self.regions(rows, cols)
            .iter()
            .flat_map(|r| r.iter().collect::<Vec<_>>())
            .collect()
    }

    pub fn contains(&self, pos: CellPosition) -> bool {
        match self {
            Selection::None => false,
            Selection::Cell(p) => *p == pos,
            Selection::Range { anchor, active } => CellRegion::new(*anchor, *active).contains(pos),
            Selection::Rows(set) => set.contains(&pos.row),
            Selection::Columns(set) => set.contains(&pos.col),
        }
    }
}

fn contiguous_runs(sorted: impl Iterator<Item = usize>) -> Vec<(usize, usize)> {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    for i in sorted {
        match runs.last_mut() {
            Some((_, end)) if *end + 1 == i => *end = i,
            _ => runs.push((i, i)),
        }
    }
    runs
}
