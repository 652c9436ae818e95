//! The single in-flight cell edit of a table

use tabula_core::{CellAddress, Value};
use tabula_grid::{CellPosition, EditSeed};

/// Draft text for one cell
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    pub address: CellAddress,
    /// Where the cell sat in the presented view when editing began
    pub position: CellPosition,
    original: Value,
    draft: String,
    dirty: bool,
}

impl EditSession {
    pub fn new(address: CellAddress, position: CellPosition, original: Value, seed: EditSeed) -> Self {
        let (draft, dirty) = match seed {
            EditSeed::Replace(text) => (text, true),
            EditSeed::Preserve => (original.display_text(), false),
        };
        Self {
            address,
            position,
            original,
            draft,
            dirty,
        }
    }

    pub fn original(&self) -> &Value {
        &self.original
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
        self.dirty = true;
    }

    pub fn insert_char(&mut self, c: char) {
        self.draft.push(c);
        self.dirty = true;
    }

    pub fn backspace(&mut self) {
        self.draft.pop();
        self.dirty = true;
    }
}

/// Holds at most one [`EditSession`]
#[derive(Debug, Default)]
pub struct EditSessionManager {
    session: Option<EditSession>,
}

impl EditSessionManager {
    /// Open a session, returning one that was still open
    pub fn begin(&mut self, session: EditSession) -> Option<EditSession> {
        self.session.replace(session)
    }

    pub fn current(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut EditSession> {
        self.session.as_mut()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Close the session so its draft can be committed
    pub fn finish(&mut self) -> Option<EditSession> {
        self.session.take()
    }

    /// Discard the draft; returns the original value
    pub fn cancel(&mut self) -> Option<Value> {
        self.session.take().map(|s| s.original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_core::TableId;

    fn addr() -> CellAddress {
        CellAddress::new_unchecked(TableId::new("s", "t"), 2, "b")
    }

    #[test]
    fn replace_seed_discards_content() {
        let session = EditSession::new(
            addr(),
            CellPosition::new(2, 1),
            Value::from("old"),
            EditSeed::Replace("5".into()),
        );
        assert_eq!(session.draft(), "5");
        assert!(session.is_dirty());
    }

    #[test]
    fn preserve_seed_keeps_content() {
        let mut session = EditSession::new(
            addr(),
            CellPosition::new(2, 1),
            Value::Int64(12),
            EditSeed::Preserve,
        );
        assert_eq!(session.draft(), "12");
        assert!(!session.is_dirty());
        session.backspace();
        session.insert_char('5');
        assert_eq!(session.draft(), "15");
    }

    #[test]
    fn manager_holds_one_session() {
        let mut manager = EditSessionManager::default();
        let first = EditSession::new(addr(), CellPosition::default(), Value::Null, EditSeed::Preserve);
        assert!(manager.begin(first.clone()).is_none());
        assert_eq!(manager.begin(first.clone()), Some(first));
        assert_eq!(manager.cancel(), Some(Value::Null));
        assert!(!manager.is_active());
    }
}
