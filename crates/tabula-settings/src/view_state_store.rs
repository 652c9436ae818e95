//! View-state stores: JSON files on disk and an in-memory map

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tabula_core::{Result, ViewState, ViewStateStore};
use uuid::Uuid;

/// One pretty-printed JSON file per table, named by a hash of the table key
pub struct JsonViewStateStore {
    dir: PathBuf,
}

impl JsonViewStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the user's data directory
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::new(crate::view_state_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the state for `table_key`
    pub fn path_for(&self, table_key: &str) -> PathBuf {
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, table_key.as_bytes());
        self.dir.join(format!("{}.json", id.simple()))
    }
}

impl ViewStateStore for JsonViewStateStore {
    fn load(&self, table_key: &str) -> Result<Option<ViewState>> {
        let path = self.path_for(table_key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let state: ViewState = serde_json::from_str(&content)?;
        tracing::debug!(table = table_key, path = ?path, "loaded view state");
        Ok(Some(state))
    }

    fn save(&self, table_key: &str, state: &ViewState) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(table_key);
        let content = serde_json::to_string_pretty(state)?;
        std::fs::write(&path, content)?;
        tracing::debug!(table = table_key, path = ?path, "saved view state");
        Ok(())
    }
}

/// Keeps view state for the lifetime of the process
#[derive(Default)]
pub struct MemoryViewStateStore {
    states: RwLock<HashMap<String, ViewState>>,
}

impl MemoryViewStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

impl ViewStateStore for MemoryViewStateStore {
    fn load(&self, table_key: &str) -> Result<Option<ViewState>> {
        Ok(self.states.read().get(table_key).cloned())
    }

    fn save(&self, table_key: &str, state: &ViewState) -> Result<()> {
        self.states
            .write()
            .insert(table_key.to_string(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> ViewState {
        let mut state = ViewState::default();
        state.column_widths.insert("name".to_string(), 180.0);
        state.row_height = Some(32.0);
        state.flags.insert("wrap".to_string(), true);
        state
    }

    #[test]
    fn json_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonViewStateStore::new(dir.path());
        store.save("main.users", &sample()).unwrap();

        let reopened = JsonViewStateStore::new(dir.path());
        assert_eq!(reopened.load("main.users").unwrap(), Some(sample()));
        assert_eq!(reopened.load("main.orders").unwrap(), None);
    }

    #[test]
    fn file_names_are_stable_hashes() {
        let store = JsonViewStateStore::new("/tmp/x");
        let a = store.path_for("main.users");
        assert_eq!(a, store.path_for("main.users"));
        assert_ne!(a, store.path_for("main.Users"));
        assert!(!a.to_string_lossy().contains("users"));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonViewStateStore::new(dir.path());
        std::fs::write(store.path_for("main.t"), "{not json").unwrap();
        assert!(store.load("main.t").is_err());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryViewStateStore::new();
        assert!(store.is_empty());
        store.save("main.t", &sample()).unwrap();
        assert_eq!(store.load("main.t").unwrap(), Some(sample()));
        assert_eq!(store.len(), 1);
    }
}
