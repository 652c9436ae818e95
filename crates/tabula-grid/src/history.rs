//! Undo/redo log
//!
//! One linear stack of reversible actions. Each action carries before and
//! after maps keyed by cell address; `apply` writes the after map to an
//! [`UndoTarget`] and `revert` writes the before map.

use std::collections::{BTreeMap, VecDeque};

use tabula_core::{CellAddress, Value};

use crate::filter::CellFormat;

/// Default number of actions kept
pub const DEFAULT_UNDO_LIMIT: usize = 100;

/// Per-cell formats; `None` means "no format"
pub type FormatMap = BTreeMap<CellAddress, Option<CellFormat>>;

/// Per-cell values
pub type ValueMap = BTreeMap<CellAddress, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum UndoPayload {
    Formats(FormatMap),
    Values(ValueMap),
}

/// Something an action can be applied to
pub trait UndoTarget {
    fn apply_formats(&mut self, formats: &FormatMap);

    fn apply_values(&mut self, values: &ValueMap);
}

#[derive(Debug, Clone, PartialEq)]
pub struct UndoAction {
    pub label: String,
    pub before: UndoPayload,
    pub after: UndoPayload,
}

impl UndoAction {
    pub fn formats(label: impl Into<String>, before: FormatMap, after: FormatMap) -> Self {
        Self {
            label: label.into(),
            before: UndoPayload::Formats(before),
            after: UndoPayload::Formats(after),
        }
    }

    pub fn values(label: impl Into<String>, before: ValueMap, after: ValueMap) -> Self {
        Self {
            label: label.into(),
            before: UndoPayload::Values(before),
            after: UndoPayload::Values(after),
        }
    }

    pub fn apply(&self, target: &mut dyn UndoTarget) {
        write_payload(&self.after, target);
    }

    pub fn revert(&self, target: &mut dyn UndoTarget) {
        write_payload(&self.before, target);
    }
}

fn write_payload(payload: &UndoPayload, target: &mut dyn UndoTarget) {
    match payload {
        UndoPayload::Formats(formats) => target.apply_formats(formats),
        UndoPayload::Values(values) => target.apply_values(values),
    }
}

#[derive(Debug, Clone)]
pub struct UndoLog {
    undo_stack: VecDeque<UndoAction>,
    redo_stack: Vec<UndoAction>,
    limit: usize,
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LIMIT)
    }
}

impl UndoLog {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record an action that has already been applied. Clears redo.
    pub fn push(&mut self, action: UndoAction) {
        self.undo_stack.push_back(action);
        self.redo_stack.clear();
        while self.undo_stack.len() > self.limit {
            self.undo_stack.pop_front();
        }
    }

    /// Revert the latest action and move it to the redo stack.
    pub fn undo(&mut self, target: &mut dyn UndoTarget) -> Option<&UndoAction> {
        let action = self.undo_stack.pop_back()?;
        action.revert(target);
        self.redo_stack.push(action);
        self.redo_stack.last()
    }

    /// Re-apply the latest undone action.
    pub fn redo(&mut self, target: &mut dyn UndoTarget) -> Option<&UndoAction> {
        let action = self.redo_stack.pop()?;
        action.apply(target);
        self.undo_stack.push_back(action);
        self.undo_stack.back()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

/// Cell formats for one table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatStore {
    formats: BTreeMap<CellAddress, CellFormat>,
}

impl FormatStore {
    pub fn get(&self, addr: &CellAddress) -> Option<&CellFormat> {
        self.formats.get(addr)
    }

    pub fn snapshot(&self) -> BTreeMap<CellAddress, CellFormat> {
        self.formats.clone()
    }

    /// Set (or clear, with `None`) the format of several cells and return
    /// the action describing the change.
    pub fn set_format<'a>(
        &mut self,
        cells: impl IntoIterator<Item = &'a CellAddress>,
        format: Option<CellFormat>,
    ) -> UndoAction {
        let mut before = FormatMap::new();
        let mut after = FormatMap::new();
        for addr in cells {
            before.insert(addr.clone(), self.formats.get(addr).cloned());
            after.insert(addr.clone(), format.clone());
        }
        self.apply_formats(&after);
        let label = if format.is_some() { "Format cells" } else { "Clear formatting" };
        UndoAction::formats(label, before, after)
    }
}

impl UndoTarget for FormatStore {
    fn apply_formats(&mut self, formats: &FormatMap) {
        for (addr, format) in formats {
            match format {
                Some(f) => {
                    self.formats.insert(addr.clone(), f.clone());
                }
                None => {
                    self.formats.remove(addr);
                }
            }
        }
    }

    fn apply_values(&mut self, _values: &ValueMap) {}
}
