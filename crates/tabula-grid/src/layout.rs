//! Column widths, row height and row virtualization

use std::collections::BTreeMap;
use std::ops::Range;

use tabula_core::{ColumnMeta, TypeFamily, ViewState};

pub const DEFAULT_ROW_HEIGHT: f32 = 28.0;
pub const MIN_COLUMN_WIDTH: f32 = 48.0;
pub const MIN_ROW_HEIGHT: f32 = 16.0;
pub const DEFAULT_VIRTUALIZATION_THRESHOLD: usize = 200;
pub const DEFAULT_OVERSCAN: usize = 5;

/// Approximate pixels per header character
const HEADER_CHAR_WIDTH: f32 = 8.0;
const HEADER_PADDING: f32 = 24.0;

/// Width a column gets before the user resizes it
pub fn default_column_width(column: &ColumnMeta) -> f32 {
    let by_type: f32 = match column.type_family() {
        TypeFamily::Boolean => 72.0,
        TypeFamily::Integer => 96.0,
        TypeFamily::Numeric => 112.0,
        TypeFamily::Date => 112.0,
        TypeFamily::Time => 96.0,
        TypeFamily::Timestamp => 180.0,
        TypeFamily::Uuid => 280.0,
        TypeFamily::Json => 240.0,
        TypeFamily::Binary => 120.0,
        TypeFamily::Text => 200.0,
        TypeFamily::Other => 150.0,
    };
    let header = column.name.chars().count() as f32 * HEADER_CHAR_WIDTH + HEADER_PADDING;
    by_type.max(header).max(MIN_COLUMN_WIDTH)
}

/// Column width overrides and the row height for one table
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutState {
    column_widths: BTreeMap<String, f32>,
    row_height: Option<f32>,
    default_row_height: f32,
    min_column_width: f32,
}

impl Default for LayoutState {
    fn default() -> Self {
        Self::new(DEFAULT_ROW_HEIGHT, MIN_COLUMN_WIDTH)
    }
}

impl LayoutState {
    pub fn new(default_row_height: f32, min_column_width: f32) -> Self {
        Self {
            column_widths: BTreeMap::new(),
            row_height: None,
            default_row_height: default_row_height.max(MIN_ROW_HEIGHT),
            min_column_width,
        }
    }

    pub fn column_width(&self, column: &ColumnMeta) -> f32 {
        self.column_widths
            .get(&column.name)
            .copied()
            .unwrap_or_else(|| default_column_width(column).max(self.min_column_width))
    }

    pub fn set_column_width(&mut self, column: impl Into<String>, width: f32) {
        self.column_widths
            .insert(column.into(), width.max(self.min_column_width));
    }

    pub fn reset_column_width(&mut self, column: &str) {
        self.column_widths.remove(column);
    }

    pub fn row_height(&self) -> f32 {
        self.row_height.unwrap_or(self.default_row_height)
    }

    pub fn set_row_height(&mut self, height: f32) {
        self.row_height = Some(height.max(MIN_ROW_HEIGHT));
    }

    pub fn min_column_width(&self) -> f32 {
        self.min_column_width
    }

    /// Restore widths and row height from a persisted record
    pub fn apply_view_state(&mut self, state: &ViewState) {
        for (column, width) in &state.column_widths {
            self.set_column_width(column.clone(), *width);
        }
        if let Some(height) = state.row_height {
            self.set_row_height(height);
        }
    }

    /// Merge this layout into a persisted record, keeping the host's fields
    pub fn to_view_state(&self, base: &ViewState) -> ViewState {
        ViewState {
            column_widths: self.column_widths.clone(),
            row_height: self.row_height,
            ..base.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResizeTarget {
    Column(String),
    Row,
}

/// An in-progress resize gesture
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeDrag {
    pub target: ResizeTarget,
    start_position: f32,
    start_size: f32,
    min_size: f32,
}

impl ResizeDrag {
    pub fn column(layout: &LayoutState, column: &ColumnMeta, start_position: f32) -> Self {
        Self {
            target: ResizeTarget::Column(column.name.clone()),
            start_position,
            start_size: layout.column_width(column),
            min_size: layout.min_column_width,
        }
    }

    pub fn row(layout: &LayoutState, start_position: f32) -> Self {
        Self {
            target: ResizeTarget::Row,
            start_position,
            start_size: layout.row_height(),
            min_size: MIN_ROW_HEIGHT,
        }
    }

    /// Size at the current pointer position: start plus delta, clamped
    pub fn size_at(&self, position: f32) -> f32 {
        (self.start_size + (position - self.start_position)).max(self.min_size)
    }

    pub fn finish(self, position: f32, layout: &mut LayoutState) -> f32 {
        let size = self.size_at(position);
        match self.target {
            ResizeTarget::Column(name) => layout.set_column_width(name, size),
            ResizeTarget::Row => layout.set_row_height(size),
        }
        size
    }
}

/// Rows of the presented view to render
#[derive(Debug, Clone, PartialEq)]
pub struct RowWindow {
    /// Positions in the presented view
    pub rows: Range<usize>,
    /// Offset of the first rendered row from the top of the grid
    pub offset_top: f32,
    /// Height of the whole view, for the scrollbar
    pub total_height: f32,
    pub virtualized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_top: f32,
    pub height: f32,
}

/// Window the presented view. Views at or below `threshold` rows render
/// in full; larger ones render the rows intersecting the viewport plus
/// `overscan` rows on each side.
pub fn visible_window(
    view_len: usize,
    row_height: f32,
    viewport: Viewport,
    threshold: usize,
    overscan: usize,
) -> RowWindow {
    let row_height = row_height.max(1.0);
    let total_height = view_len as f32 * row_height;
    if view_len <= threshold {
        return RowWindow {
            rows: 0..view_len,
            offset_top: 0.0,
            total_height,
            virtualized: false,
        };
    }
    let scroll_top = viewport.scroll_top.clamp(0.0, total_height);
    let first = (scroll_top / row_height).floor() as usize;
    let last = ((scroll_top + viewport.height.max(0.0)) / row_height).ceil() as usize;
    let start = first.saturating_sub(overscan).min(view_len);
    let end = (last + overscan).min(view_len).max(start);
    RowWindow {
        rows: start..end,
        offset_top: start as f32 * row_height,
        total_height,
        virtualized: true,
    }
}
