//! Tabula Core - data model and collaborator contracts for the grid editor
//!
//! This crate provides the types every other Tabula crate reads:
//!
//! - `Value`, `Row`, `ColumnMeta` - typed cell values and column metadata
//! - `TableId`, `CellAddress` - typed composite keys for tables and cells
//! - `TableSnapshot` - the in-memory copy of an open table
//! - `PersistenceGateway` - the minimal contract the engine needs from a store
//! - `ViewStateStore` - persistence contract for per-table layout
//! - attachment detection helpers for serialized attachment lists

mod address;
pub mod attachment;
mod error;
mod gateway;
mod snapshot;
mod types;
mod view_state;

pub use address::*;
pub use error::*;
pub use gateway::*;
pub use snapshot::*;
pub use types::*;
pub use view_state::*;
