//! Keyboard and pointer state machine for the grid.
//!
//! [`GridController`] owns selection, anchor and the editing flag as one
//! state machine. It never changes data: every key press yields a
//! [`GridCommand`] that the editor executes.

use std::collections::BTreeSet;

use crate::selection::{CellPosition, Selection};

/// Default PageUp/PageDown distance
pub const DEFAULT_PAGE_JUMP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Idle,
    /// Pointer drag in progress
    Selecting,
    /// An edit session is open on the active cell
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Tab,
    Enter,
    Home,
    End,
    PageUp,
    PageDown,
    F2,
    Delete,
    Backspace,
    Escape,
    Char(char),
}

/// A key press with its modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub shift: bool,
    pub ctrl: bool,
}

impl KeyInput {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            shift: false,
            ctrl: false,
        }
    }

    pub fn shift(key: Key) -> Self {
        Self {
            key,
            shift: true,
            ctrl: false,
        }
    }

    pub fn ctrl(key: Key) -> Self {
        Self {
            key,
            shift: false,
            ctrl: true,
        }
    }

    pub fn ctrl_shift(key: Key) -> Self {
        Self {
            key,
            shift: true,
            ctrl: true,
        }
    }

    pub fn char(c: char) -> Self {
        Self::plain(Key::Char(c))
    }
}

/// How a new edit session seeds its draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditSeed {
    /// Discard the current content and start from this text
    Replace(String),
    /// Start from the cell's current content
    Preserve,
}

/// What the editor should do in response to input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridCommand {
    None,
    /// Only the selection moved
    SelectionChanged,
    BeginEdit {
        at: CellPosition,
        seed: EditSeed,
    },
    DraftInsert(char),
    DraftBackspace,
    /// Commit the open session without waiting for the debounce; the
    /// controller has already moved to `to`.
    CommitAndMove {
        from: CellPosition,
        to: CellPosition,
    },
    CancelEdit {
        at: CellPosition,
    },
    Clear {
        cells: Vec<CellPosition>,
    },
    Copy,
    Cut,
    Paste {
        at: CellPosition,
    },
    Undo,
    Redo,
}

#[derive(Debug, Clone)]
pub struct GridController {
    state: ControllerState,
    selection: Selection,
    active: Option<CellPosition>,
    anchor: Option<CellPosition>,
    rows: usize,
    cols: usize,
    page_jump: usize,
}

impl Default for GridController {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl GridController {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            state: ControllerState::Idle,
            selection: Selection::None,
            active: None,
            anchor: None,
            rows,
            cols,
            page_jump: DEFAULT_PAGE_JUMP,
        }
    }

    pub fn with_page_jump(mut self, page_jump: usize) -> Self {
        self.page_jump = page_jump.max(1);
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_editing(&self) -> bool {
        self.state == ControllerState::Editing
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn active(&self) -> Option<CellPosition> {
        self.active
    }

    pub fn anchor(&self) -> Option<CellPosition> {
        self.anchor
    }

    pub fn bounds(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Resize the grid, e.g. after a filter changes the presented row count.
    pub fn set_bounds(&mut self, rows: usize, cols: usize) {
        self.rows = rows;
        self.cols = cols;
        if rows == 0 || cols == 0 {
            self.clear();
            return;
        }
        if let Some(active) = self.active {
            let clamped = self.clamp(active);
            if clamped != active {
                self.collapse_to(clamped);
            }
        }
    }

    pub fn begin_selection(&mut self, pos: CellPosition) {
        let pos = self.clamp(pos);
        if self.state != ControllerState::Editing {
            self.state = ControllerState::Selecting;
        }
        self.collapse_to(pos);
    }

    pub fn extend_selection(&mut self, pos: CellPosition) {
        let pos = self.clamp(pos);
        let anchor = self.anchor.or(self.active).unwrap_or(pos);
        self.set_range(anchor, pos);
    }

    pub fn end_selection(&mut self) {
        if self.state == ControllerState::Selecting {
            self.state = ControllerState::Idle;
        }
    }

    pub fn select_row(&mut self, row: usize) {
        if row >= self.rows || self.cols == 0 {
            return;
        }
        self.selection = Selection::Rows(BTreeSet::from([row]));
        self.active = Some(CellPosition::new(row, 0));
        self.anchor = self.active;
    }

    /// Select a column by its index in the visible column order
    pub fn select_column(&mut self, col: usize) {
        if col >= self.cols || self.rows == 0 {
            return;
        }
        self.selection = Selection::Columns(BTreeSet::from([col]));
        self.active = Some(CellPosition::new(0, col));
        self.anchor = self.active;
    }

    pub fn select_all(&mut self) {
        if self.rows == 0 || self.cols == 0 {
            return;
        }
        let last = CellPosition::new(self.rows - 1, self.cols - 1);
        self.anchor = Some(CellPosition::new(0, 0));
        self.active = Some(last);
        self.selection = if self.rows == 1 && self.cols == 1 {
            Selection::Cell(last)
        } else {
            Selection::Range {
                anchor: CellPosition::new(0, 0),
                active: last,
            }
        };
    }

    pub fn clear(&mut self) {
        self.selection = Selection::None;
        self.active = None;
        self.anchor = None;
        self.state = ControllerState::Idle;
    }

    /// Enter editing on the active cell, cancelling any drag.
    pub fn enter_editing(&mut self) -> Option<CellPosition> {
        let active = self.active?;
        self.collapse_to(active);
        self.state = ControllerState::Editing;
        Some(active)
    }

    /// Put the controller back into editing at `pos`, e.g. after a commit
    /// was rejected.
    pub fn resume_editing(&mut self, pos: CellPosition) {
        self.collapse_to(self.clamp(pos));
        self.state = ControllerState::Editing;
    }

    pub fn exit_editing(&mut self) {
        if self.state == ControllerState::Editing {
            self.state = ControllerState::Idle;
        }
    }

    pub fn handle_key(&mut self, input: KeyInput) -> GridCommand {
        if self.rows == 0 || self.cols == 0 {
            return GridCommand::None;
        }
        if self.state == ControllerState::Selecting {
            self.state = ControllerState::Idle;
        }
        if self.state == ControllerState::Editing {
            return self.handle_editing_key(input);
        }
        if input.ctrl {
            if let Some(command) = self.handle_shortcut(input) {
                return command;
            }
        }

        let Some(active) = self.active else {
            // First key press lands on the top-left cell
            self.collapse_to(CellPosition::new(0, 0));
            return GridCommand::SelectionChanged;
        };

        match input.key {
            Key::Char(c) if !input.ctrl => match self.enter_editing() {
                Some(at) => GridCommand::BeginEdit {
                    at,
                    seed: EditSeed::Replace(c.to_string()),
                },
                None => GridCommand::None,
            },
            Key::F2 => match self.enter_editing() {
                Some(at) => GridCommand::BeginEdit {
                    at,
                    seed: EditSeed::Preserve,
                },
                None => GridCommand::None,
            },
            Key::Backspace => match self.enter_editing() {
                Some(at) => GridCommand::BeginEdit {
                    at,
                    seed: EditSeed::Replace(String::new()),
                },
                None => GridCommand::None,
            },
            Key::Delete => GridCommand::Clear {
                cells: self.selection.cells(self.rows, self.cols),
            },
            Key::Escape => {
                if matches!(self.selection, Selection::Cell(p) if p == active) {
                    GridCommand::None
                } else {
                    self.collapse_to(active);
                    GridCommand::SelectionChanged
                }
            }
            Key::Tab => {
                let to = if input.shift {
                    self.tab_back(active)
                } else {
                    self.tab_forward(active)
                };
                self.collapse_to(to);
                GridCommand::SelectionChanged
            }
            key => {
                let Some(to) = self.step(active, key, input.ctrl, input.shift) else {
                    return GridCommand::None;
                };
                if input.shift && !matches!(key, Key::Enter) {
                    let anchor = self.anchor.unwrap_or(active);
                    self.set_range(anchor, to);
                } else {
                    self.collapse_to(to);
                }
                GridCommand::SelectionChanged
            }
        }
    }

    fn handle_shortcut(&mut self, input: KeyInput) -> Option<GridCommand> {
        let Key::Char(c) = input.key else {
            return None;
        };
        let command = match c.to_ascii_lowercase() {
            'c' => GridCommand::Copy,
            'x' => GridCommand::Cut,
            'v' => GridCommand::Paste {
                at: self
                    .selection
                    .region()
                    .map(|r| r.top_left())
                    .or(self.active)
                    .unwrap_or_default(),
            },
            'z' if input.shift => GridCommand::Redo,
            'z' => GridCommand::Undo,
            'y' => GridCommand::Redo,
            'a' => {
                self.select_all();
                GridCommand::SelectionChanged
            }
            _ => GridCommand::None,
        };
        Some(command)
    }

    fn handle_editing_key(&mut self, input: KeyInput) -> GridCommand {
        let Some(from) = self.active else {
            self.state = ControllerState::Idle;
            return GridCommand::None;
        };
        match input.key {
            Key::Escape => {
                self.state = ControllerState::Idle;
                GridCommand::CancelEdit { at: from }
            }
            Key::Char(_) if input.ctrl => GridCommand::None,
            Key::Char(c) => GridCommand::DraftInsert(c),
            Key::Backspace => GridCommand::DraftBackspace,
            Key::Up | Key::Down | Key::Left | Key::Right | Key::Enter | Key::Tab => {
                let to = match input.key {
                    Key::Tab if input.shift => self.tab_back(from),
                    Key::Tab => self.tab_forward(from),
                    key => self.step(from, key, false, input.shift).unwrap_or(from),
                };
                self.state = ControllerState::Idle;
                self.collapse_to(to);
                GridCommand::CommitAndMove { from, to }
            }
            _ => GridCommand::None,
        }
    }

    /// Target of a movement key, clamped to the grid
    fn step(&self, from: CellPosition, key: Key, ctrl: bool, shift: bool) -> Option<CellPosition> {
        let last_row = self.rows - 1;
        let last_col = self.cols - 1;
        let to = match key {
            Key::Up => CellPosition::new(from.row.saturating_sub(1), from.col),
            Key::Down => CellPosition::new((from.row + 1).min(last_row), from.col),
            Key::Left => CellPosition::new(from.row, from.col.saturating_sub(1)),
            Key::Right => CellPosition::new(from.row, (from.col + 1).min(last_col)),
            Key::Enter if shift => CellPosition::new(from.row.saturating_sub(1), from.col),
            Key::Enter => CellPosition::new((from.row + 1).min(last_row), from.col),
            Key::Home if ctrl => CellPosition::new(0, 0),
            Key::Home => CellPosition::new(from.row, 0),
            Key::End if ctrl => CellPosition::new(last_row, last_col),
            Key::End => CellPosition::new(from.row, last_col),
            Key::PageUp => CellPosition::new(from.row.saturating_sub(self.page_jump), from.col),
            Key::PageDown => {
                CellPosition::new((from.row + self.page_jump).min(last_row), from.col)
            }
            _ => return None,
        };
        Some(to)
    }

    fn tab_forward(&self, from: CellPosition) -> CellPosition {
        if from.col + 1 < self.cols {
            CellPosition::new(from.row, from.col + 1)
        } else if from.row + 1 < self.rows {
            CellPosition::new(from.row + 1, 0)
        } else {
            from
        }
    }

    fn tab_back(&self, from: CellPosition) -> CellPosition {
        if from.col > 0 {
            CellPosition::new(from.row, from.col - 1)
        } else if from.row > 0 {
            CellPosition::new(from.row - 1, self.cols - 1)
        } else {
            from
        }
    }

    fn clamp(&self, pos: CellPosition) -> CellPosition {
        CellPosition::new(
            pos.row.min(self.rows.saturating_sub(1)),
            pos.col.min(self.cols.saturating_sub(1)),
        )
    }

    fn collapse_to(&mut self, pos: CellPosition) {
        self.active = Some(pos);
        self.anchor = Some(pos);
        self.selection = Selection::Cell(pos);
    }

    fn set_range(&mut self, anchor: CellPosition, active: CellPosition) {
        self.anchor = Some(anchor);
        self.active = Some(active);
        self.selection = if anchor == active {
            Selection::Cell(active)
        } else {
            Selection::Range { anchor, active }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(row: usize, col: usize) -> GridController {
        let mut c = GridController::new(5, 3);
        c.begin_selection(CellPosition::new(row, col));
        c.end_selection();
        c
    }

    #[test]
    fn arrows_clamp_at_edges() {
        let mut c = at(0, 0);
        c.handle_key(KeyInput::plain(Key::Up));
        c.handle_key(KeyInput::plain(Key::Left));
        assert_eq!(c.active(), Some(CellPosition::new(0, 0)));
        c.handle_key(KeyInput::plain(Key::Right));
        assert_eq!(c.active(), Some(CellPosition::new(0, 1)));
    }

    #[test]
    fn shift_arrow_extends_from_anchor() {
        let mut c = at(1, 1);
        c.handle_key(KeyInput::shift(Key::Down));
        c.handle_key(KeyInput::shift(Key::Right));
        assert_eq!(
            c.selection(),
            &Selection::Range {
                anchor: CellPosition::new(1, 1),
                active: CellPosition::new(2, 2),
            }
        );
    }

    #[test]
    fn tab_wraps_between_rows_and_stops_at_ends() {
        let mut c = at(0, 2);
        c.handle_key(KeyInput::plain(Key::Tab));
        assert_eq!(c.active(), Some(CellPosition::new(1, 0)));
        c.handle_key(KeyInput::shift(Key::Tab));
        assert_eq!(c.active(), Some(CellPosition::new(0, 2)));

        let mut first = at(0, 0);
        first.handle_key(KeyInput::shift(Key::Tab));
        assert_eq!(first.active(), Some(CellPosition::new(0, 0)));

        let mut last = at(4, 2);
        last.handle_key(KeyInput::plain(Key::Tab));
        assert_eq!(last.active(), Some(CellPosition::new(4, 2)));
    }

    #[test]
    fn home_end_and_ctrl_variants() {
        let mut c = at(2, 1);
        c.handle_key(KeyInput::plain(Key::End));
        assert_eq!(c.active(), Some(CellPosition::new(2, 2)));
        c.handle_key(KeyInput::plain(Key::Home));
        assert_eq!(c.active(), Some(CellPosition::new(2, 0)));
        c.handle_key(KeyInput::ctrl(Key::End));
        assert_eq!(c.active(), Some(CellPosition::new(4, 2)));
        c.handle_key(KeyInput::ctrl(Key::Home));
        assert_eq!(c.active(), Some(CellPosition::new(0, 0)));
    }

    #[test]
    fn page_keys_jump_and_clamp() {
        let mut c = GridController::new(25, 2).with_page_jump(10);
        c.begin_selection(CellPosition::new(3, 0));
        c.handle_key(KeyInput::plain(Key::PageDown));
        assert_eq!(c.active(), Some(CellPosition::new(13, 0)));
        c.handle_key(KeyInput::plain(Key::PageDown));
        c.handle_key(KeyInput::plain(Key::PageDown));
        assert_eq!(c.active(), Some(CellPosition::new(24, 0)));
        c.handle_key(KeyInput::plain(Key::PageUp));
        assert_eq!(c.active(), Some(CellPosition::new(14, 0)));
    }

    #[test]
    fn typing_enters_editing_with_replacing_seed() {
        let mut c = at(2, 1);
        let command = c.handle_key(KeyInput::char('5'));
        assert_eq!(
            command,
            GridCommand::BeginEdit {
                at: CellPosition::new(2, 1),
                seed: EditSeed::Replace("5".into()),
            }
        );
        assert!(c.is_editing());
        assert_eq!(c.handle_key(KeyInput::char('0')), GridCommand::DraftInsert('0'));
    }

    #[test]
    fn f2_preserves_content() {
        let mut c = at(0, 0);
        assert_eq!(
            c.handle_key(KeyInput::plain(Key::F2)),
            GridCommand::BeginEdit {
                at: CellPosition::new(0, 0),
                seed: EditSeed::Preserve,
            }
        );
    }

    #[test]
    fn navigation_while_editing_commits_then_moves() {
        let mut c = at(1, 1);
        c.handle_key(KeyInput::char('x'));
        let command = c.handle_key(KeyInput::plain(Key::Enter));
        assert_eq!(
            command,
            GridCommand::CommitAndMove {
                from: CellPosition::new(1, 1),
                to: CellPosition::new(2, 1),
            }
        );
        assert_eq!(c.state(), ControllerState::Idle);
    }

    #[test]
    fn escape_cancels_edit_or_collapses_range() {
        let mut c = at(1, 1);
        c.handle_key(KeyInput::plain(Key::F2));
        assert_eq!(
            c.handle_key(KeyInput::plain(Key::Escape)),
            GridCommand::CancelEdit {
                at: CellPosition::new(1, 1)
            }
        );
        c.handle_key(KeyInput::shift(Key::Down));
        c.handle_key(KeyInput::plain(Key::Escape));
        assert_eq!(c.selection(), &Selection::Cell(CellPosition::new(2, 1)));
    }

    #[test]
    fn delete_clears_every_selected_cell_without_editing() {
        let mut c = at(0, 0);
        c.handle_key(KeyInput::shift(Key::Right));
        let GridCommand::Clear { cells } = c.handle_key(KeyInput::plain(Key::Delete)) else {
            panic!("expected clear");
        };
        assert_eq!(cells, vec![CellPosition::new(0, 0), CellPosition::new(0, 1)]);
        assert!(!c.is_editing());
    }

    #[test]
    fn backspace_collapses_and_edits_empty() {
        let mut c = at(0, 0);
        c.handle_key(KeyInput::shift(Key::Down));
        let command = c.handle_key(KeyInput::plain(Key::Backspace));
        assert_eq!(
            command,
            GridCommand::BeginEdit {
                at: CellPosition::new(1, 0),
                seed: EditSeed::Replace(String::new()),
            }
        );
        assert_eq!(c.selection(), &Selection::Cell(CellPosition::new(1, 0)));
    }

    #[test]
    fn shortcuts_map_to_commands() {
        let mut c = at(1, 1);
        c.handle_key(KeyInput::shift(Key::Up));
        assert_eq!(c.handle_key(KeyInput::ctrl(Key::Char('c'))), GridCommand::Copy);
        assert_eq!(
            c.handle_key(KeyInput::ctrl(Key::Char('v'))),
            GridCommand::Paste {
                at: CellPosition::new(0, 1)
            }
        );
        assert_eq!(c.handle_key(KeyInput::ctrl(Key::Char('z'))), GridCommand::Undo);
        assert_eq!(c.handle_key(KeyInput::ctrl(Key::Char('y'))), GridCommand::Redo);
        assert_eq!(
            c.handle_key(KeyInput::ctrl_shift(Key::Char('Z'))),
            GridCommand::Redo
        );
        c.handle_key(KeyInput::ctrl(Key::Char('a')));
        assert_eq!(c.selection().region().map(|r| r.row_count()), Some(5));
    }

    #[test]
    fn entering_editing_cancels_drag() {
        let mut c = GridController::new(5, 3);
        c.begin_selection(CellPosition::new(0, 0));
        c.extend_selection(CellPosition::new(2, 2));
        assert_eq!(c.state(), ControllerState::Selecting);
        c.enter_editing();
        assert_eq!(c.state(), ControllerState::Editing);
        assert_eq!(c.selection(), &Selection::Cell(CellPosition::new(2, 2)));
    }
}
