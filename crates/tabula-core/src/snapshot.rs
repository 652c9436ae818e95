//! In-memory copy of an open table

use std::sync::Arc;

use crate::{CellAddress, ColumnMeta, Result, Row, TableId, TabulaError, Value};

/// Key column used when the table declares nothing better
pub const DEFAULT_KEY_COLUMN: &str = "id";

/// Columns and rows of one open table.
///
/// Rows are only ever appended; sorting and filtering work on derived index
/// lists. Each row sits behind an `Arc` and writers swap in a fresh row, so a
/// reader holding a clone never sees a half-applied edit.
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    table: TableId,
    columns: Vec<ColumnMeta>,
    rows: Vec<Arc<Row>>,
}

impl TableSnapshot {
    pub fn new(table: TableId, columns: Vec<ColumnMeta>, rows: Vec<Row>) -> Self {
        Self {
            table,
            columns,
            rows: rows.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn table(&self) -> &TableId {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn rows(&self) -> &[Arc<Row>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Arc<Row>> {
        self.rows.get(index)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Build an address, rejecting rows or columns the snapshot doesn't have.
    pub fn address(&self, row: usize, column: &str) -> Result<CellAddress> {
        if self.column(column).is_none() {
            return Err(TabulaError::NotFound(format!(
                "column '{}' in {}",
                column, self.table
            )));
        }
        if row >= self.rows.len() {
            return Err(TabulaError::NotFound(format!(
                "row {} in {} ({} rows)",
                row,
                self.table,
                self.rows.len()
            )));
        }
        Ok(CellAddress::new_unchecked(self.table.clone(), row, column))
    }

    /// Current value at `(row, column)`. A column missing from the row map
    /// reads as NULL.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        const NULL: &Value = &Value::Null;
        self.rows
            .get(row)
            .map(|r| r.get(column).unwrap_or(NULL))
    }

    /// Value at an address, if the address belongs to this snapshot
    pub fn value_at(&self, addr: &CellAddress) -> Option<&Value> {
        if addr.table != self.table {
            return None;
        }
        self.value(addr.row, &addr.column)
    }

    /// Write one cell, returning the previous value.
    pub fn set_cell(&mut self, row: usize, column: &str, value: Value) -> Result<Value> {
        if self.column(column).is_none() {
            return Err(TabulaError::NotFound(format!("column '{}'", column)));
        }
        let slot = self
            .rows
            .get_mut(row)
            .ok_or_else(|| TabulaError::NotFound(format!("row {}", row)))?;
        let mut updated = Row::clone(slot);
        let previous = updated.set(column, value).unwrap_or(Value::Null);
        *slot = Arc::new(updated);
        Ok(previous)
    }

    /// Replace a whole row, e.g. with the authoritative row a store returned.
    pub fn replace_row(&mut self, index: usize, row: Row) -> Result<Arc<Row>> {
        let slot = self
            .rows
            .get_mut(index)
            .ok_or_else(|| TabulaError::NotFound(format!("row {}", index)))?;
        Ok(std::mem::replace(slot, Arc::new(row)))
    }

    /// Append a row and return its index
    pub fn push_row(&mut self, row: Row) -> usize {
        self.rows.push(Arc::new(row));
        self.rows.len() - 1
    }

    /// Resolve the key column: a primary column named `id`, then any primary
    /// column, then a column named `id`, then `id` regardless.
    pub fn primary_key_column(&self) -> &str {
        self.columns
            .iter()
            .find(|c| c.is_primary_key && c.name == DEFAULT_KEY_COLUMN)
            .or_else(|| self.columns.iter().find(|c| c.is_primary_key))
            .or_else(|| self.columns.iter().find(|c| c.name == DEFAULT_KEY_COLUMN))
            .map(|c| c.name.as_str())
            .unwrap_or(DEFAULT_KEY_COLUMN)
    }

    /// The row's key value, if present and not blank.
    pub fn key_value(&self, row: usize) -> Option<&Value> {
        let key = self.primary_key_column();
        self.rows
            .get(row)
            .and_then(|r| r.get(key))
            .filter(|v| !v.is_blank())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn snapshot() -> TableSnapshot {
        TableSnapshot::new(
            TableId::new("public", "t"),
            vec![
                ColumnMeta::new("id", "int").primary_key(),
                ColumnMeta::new("name", "text"),
            ],
            vec![
                Row::new().with("id", 1i64).with("name", "a"),
                Row::new().with("name", "new"),
            ],
        )
    }

    #[test]
    fn address_validates_column_and_row() {
        let snap = snapshot();
        assert!(snap.address(0, "name").is_ok());
        assert!(snap.address(0, "missing").is_err());
        assert!(snap.address(5, "name").is_err());
    }

    #[test]
    fn set_cell_leaves_previously_shared_rows_untouched() {
        let mut snap = snapshot();
        let before = Arc::clone(&snap.rows()[0]);
        let previous = snap.set_cell(0, "name", Value::from("b")).unwrap();
        assert_eq!(previous, Value::from("a"));
        assert_eq!(before.get("name"), Some(&Value::from("a")));
        assert_eq!(snap.value(0, "name"), Some(&Value::from("b")));
    }

    #[test]
    fn missing_cells_read_as_null() {
        let snap = snapshot();
        assert_eq!(snap.value(1, "id"), Some(&Value::Null));
        assert_eq!(snap.value(9, "id"), None);
    }

    #[test]
    fn key_resolution_order() {
        let snap = snapshot();
        assert_eq!(snap.primary_key_column(), "id");
        assert!(snap.key_value(0).is_some());
        assert!(snap.key_value(1).is_none());

        let other_pk = TableSnapshot::new(
            TableId::new("s", "t"),
            vec![
                ColumnMeta::new("id", "int"),
                ColumnMeta::new("code", "text").primary_key(),
            ],
            vec![],
        );
        assert_eq!(other_pk.primary_key_column(), "code");

        let unflagged = TableSnapshot::new(
            TableId::new("s", "t"),
            vec![ColumnMeta::new("name", "text")],
            vec![],
        );
        assert_eq!(unflagged.primary_key_column(), "id");
    }
}
