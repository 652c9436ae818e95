//! Persisted per-table view state

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Layout remembered for one table between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewState {
    /// Window position `(x, y)` chosen by the host
    pub position: Option<(f32, f32)>,
    /// Window size `(width, height)` chosen by the host
    pub size: Option<(f32, f32)>,
    pub column_widths: BTreeMap<String, f32>,
    pub row_height: Option<f32>,
    /// Free-form boolean toggles owned by the host
    pub flags: BTreeMap<String, bool>,
}

impl ViewState {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Load and save [`ViewState`] by table key (`schema.table`).
pub trait ViewStateStore: Send + Sync {
    /// Returns `None` when nothing was saved for the key.
    fn load(&self, table_key: &str) -> Result<Option<ViewState>>;

    fn save(&self, table_key: &str, state: &ViewState) -> Result<()>;
}
