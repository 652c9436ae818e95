//! Tabula Grid - synchronous grid logic
//!
//! Everything here runs without touching a store: selection and keyboard
//! navigation, clipboard text, the filter/sort pipeline, formula evaluation,
//! the undo log and column/row layout. Services drive these pieces and talk
//! to the gateway.

pub mod clipboard;
mod error;
pub mod filter;
pub mod formula;
pub mod history;
pub mod layout;
pub mod navigation;
pub mod pipeline;
pub mod selection;

pub use clipboard::{copy_region, parse_tsv, to_tsv, PastePlan};
pub use error::{GridError, Result};
pub use filter::{
    CellFormat, ColumnFilter, DataFilter, FilterCondition, SortDirection, SortSpec,
    ValidationRules,
};
pub use formula::{
    column_letters, evaluate_formula, evaluate_or_sentinel, is_formula, parse_column_letters,
    CellSource, FORMULA_ERROR,
};
pub use history::{FormatMap, FormatStore, UndoAction, UndoLog, UndoPayload, UndoTarget, ValueMap};
pub use layout::{visible_window, LayoutState, ResizeDrag, ResizeTarget, RowWindow, Viewport};
pub use navigation::{ControllerState, EditSeed, GridCommand, GridController, Key, KeyInput};
pub use pipeline::{apply_pipeline, compare_cell_values};
pub use selection::{CellPosition, CellRegion, Selection};
