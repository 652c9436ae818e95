//! Tabula Services Layer
//!
//! This crate sits between a host UI and the grid logic. It owns the parts
//! of the editor that talk to a store:
//!
//! ```text
//! Host UI
//!     ↓
//! TableEditor (this crate) - key handling, edit sessions, debounce, undo
//!     ↓
//! MutationSynchronizer (this crate) - INSERT/UPDATE planning and reconciliation
//!     ↓
//! PersistenceGateway (tabula-core) - implemented by drivers
//! ```
//!
//! - [`TableEditor`] - one open table: snapshot, view, selection, editing
//! - [`MutationSynchronizer`] - turns one cell write into one statement
//! - [`DebounceQueue`] - per-cell trailing-edge deadlines
//! - [`SnapshotCache`] - TTL cache of fetched tables
//! - [`validate`] - local required/pattern/range checks

mod cache;
mod debounce;
mod edit_session;
mod error;
mod synchronizer;
mod table_editor;
mod validation;

pub use cache::SnapshotCache;
pub use debounce::DebounceQueue;
pub use edit_session::{EditSession, EditSessionManager};
pub use error::{ServiceError, ServiceResult, StatusLevel, StatusMessage};
pub use synchronizer::{
    literal_default, minimal_value, parse_input, quote_identifier, resolve_clear, CellMutation,
    CellWrite, MutationOutcome, MutationPlan, MutationSynchronizer,
};
pub use table_editor::{EditorConfig, TableEditor};
pub use validation::validate;
