//! Persistence gateway contract

use crate::{ColumnMeta, Result, Row, Value};
use async_trait::async_trait;

/// A parameterized statement ready to hand to a gateway
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// The minimal contract the editor needs from a backing store.
///
/// Implementations own the wire protocol; the editor only sees columns and
/// rows. Every statement the editor issues ends in `RETURNING *`, so
/// `execute` returns the rows the store reports back.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Driver name (e.g. "sqlite", "postgresql", "mysql"). Drives identifier
    /// quoting and parameter placeholder style.
    fn driver_name(&self) -> &str;

    /// Column metadata for a table, in declaration order
    async fn fetch_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnMeta>>;

    /// The first `limit` rows of a table
    async fn fetch_rows(&self, schema: &str, table: &str, limit: usize) -> Result<Vec<Row>>;

    /// Run a statement and return the rows it produced
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Convenience wrapper for a prepared [`Statement`]
    async fn execute_statement(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.execute(&statement.sql, &statement.params).await
    }
}
