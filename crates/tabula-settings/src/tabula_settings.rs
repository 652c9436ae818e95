//! Tabula Settings
//!
//! Engine settings persisted as JSON, plus the file-backed and in-memory
//! view-state stores.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tabula_services::EditorConfig;

mod settings_file;
mod view_state_store;

pub use settings_file::*;
pub use view_state_store::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub initial_row_limit: usize,
    pub debounce_ms: u64,
    pub page_jump: usize,
    pub snapshot_cache_ttl_secs: u64,
    pub revert_on_failure: bool,
    pub gateway_timeout_ms: Option<u64>,
    pub virtualization_threshold: usize,
    pub overscan: usize,
    pub default_row_height: f32,
    pub min_column_width: f32,
    pub undo_limit: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            initial_row_limit: 200,
            debounce_ms: 500,
            page_jump: 10,
            snapshot_cache_ttl_secs: 30,
            revert_on_failure: false,
            gateway_timeout_ms: None,
            virtualization_threshold: 200,
            overscan: 5,
            default_row_height: 28.0,
            min_column_width: 48.0,
            undo_limit: 100,
        }
    }
}

impl EngineSettings {
    /// Load from the user's settings file, or defaults when it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&settings_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        serde_json::from_str(&content).with_context(|| "Failed to parse settings JSON")
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&settings_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write settings to {:?}", path))?;
        Ok(())
    }

    pub fn snapshot_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.snapshot_cache_ttl_secs)
    }

    pub fn editor_config(&self) -> EditorConfig {
        EditorConfig {
            initial_row_limit: self.initial_row_limit.max(1),
            debounce: Duration::from_millis(self.debounce_ms),
            page_jump: self.page_jump.max(1),
            revert_on_failure: self.revert_on_failure,
            gateway_timeout: self.gateway_timeout_ms.map(Duration::from_millis),
            virtualization_threshold: self.virtualization_threshold,
            overscan: self.overscan,
            default_row_height: self.default_row_height,
            min_column_width: self.min_column_width,
            undo_limit: self.undo_limit.max(1),
        }
    }
}
