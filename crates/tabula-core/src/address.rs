//! Typed identifiers for tables and cells

use serde::{Deserialize, Serialize};

/// Identifies a table as `schema.table`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId {
    pub schema: String,
    pub table: String,
}

impl TableId {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Parse `schema.table`, or a bare `table` into the `main` schema.
    pub fn parse(qualified: &str) -> Self {
        match qualified.split_once('.') {
            Some((schema, table)) => Self::new(schema, table),
            None => Self::new("main", qualified),
        }
    }

    /// Stable key used by view-state and cache lookups
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// One grid cell: table, row index into the snapshot, column name.
///
/// Row indices address the underlying snapshot array, never the sorted or
/// filtered view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    pub table: TableId,
    pub row: usize,
    pub column: String,
}

impl CellAddress {
    /// Build an address without checking it against a snapshot.
    ///
    /// Prefer [`crate::TableSnapshot::address`], which rejects unknown columns.
    pub fn new_unchecked(table: TableId, row: usize, column: impl Into<String>) -> Self {
        Self {
            table,
            row,
            column: column.into(),
        }
    }

    /// Same table and column, different row
    pub fn with_row(&self, row: usize) -> Self {
        Self {
            table: self.table.clone(),
            row,
            column: self.column.clone(),
        }
    }
}

impl std::fmt::Display for CellAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}].{}", self.table, self.row, self.column)
    }
}
