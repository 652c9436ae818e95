//! SQLite gateway over a single rusqlite connection

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params_from_iter, Connection as RusqliteConnection, OpenFlags};
use tabula_core::{ColumnMeta, PersistenceGateway, Result, Row, TabulaError, Value};

use crate::values::{rusqlite_to_value, values_to_rusqlite};

/// SQLite implementation of [`PersistenceGateway`]
pub struct SqliteGateway {
    conn: Arc<Mutex<RusqliteConnection>>,
}

impl SqliteGateway {
    /// Open (or create) a database file, or `:memory:`
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                TabulaError::Gateway(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            let file_path = std::path::Path::new(path);
            if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                if !parent.exists() {
                    return Err(TabulaError::Gateway(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    )));
                }
            }
            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            RusqliteConnection::open_with_flags(path, flags).map_err(|e| {
                TabulaError::Gateway(format!("Failed to open SQLite database at '{}': {}", path, e))
            })?
        };

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| TabulaError::Gateway(format!("Failed to enable foreign keys: {}", e)))?;

        tracing::info!(path = %path, "SQLite database connection established");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// Run a script of statements, e.g. schema setup
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        tracing::debug!("executing SQL batch");
        self.conn
            .lock()
            .execute_batch(sql)
            .map_err(|e| TabulaError::Query(format!("Failed to execute batch: {}", e)))
    }

    fn query_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let conn = self.conn.lock();
        let sql_params = values_to_rusqlite(params);

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| TabulaError::Query(format!("Failed to prepare statement: {}", e)))?;

        let columns: Vec<(String, Option<String>)> = stmt
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.decl_type().map(str::to_string)))
            .collect();

        let mut rows = Vec::new();
        let mut cursor = stmt
            .query(params_from_iter(sql_params.iter()))
            .map_err(|e| TabulaError::Query(format!("Failed to execute statement: {}", e)))?;

        while let Some(row) = cursor
            .next()
            .map_err(|e| TabulaError::Query(format!("Failed to fetch row: {}", e)))?
        {
            let mut values = Vec::with_capacity(columns.len());
            for (idx, (name, decl_type)) in columns.iter().enumerate() {
                let value_ref = row
                    .get_ref(idx)
                    .map_err(|e| TabulaError::Query(e.to_string()))?;
                values.push((name.clone(), rusqlite_to_value(value_ref, decl_type.as_deref())));
            }
            rows.push(Row::from_pairs(values));
        }

        tracing::debug!(row_count = rows.len(), "statement returned rows");
        Ok(rows)
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[async_trait]
impl PersistenceGateway for SqliteGateway {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnMeta>> {
        tracing::trace!(table = %table, "fetching column information");
        let info = self.query_rows(
            &format!("PRAGMA {}.table_info({})", quote(schema), quote(table)),
            &[],
        )?;
        let foreign_keys: HashSet<String> = self
            .query_rows(
                &format!("PRAGMA {}.foreign_key_list({})", quote(schema), quote(table)),
                &[],
            )?
            .iter()
            .filter_map(|row| row.get("from").and_then(Value::as_str).map(str::to_string))
            .collect();

        let columns = info
            .iter()
            .map(|row| {
                let name = row.get("name").and_then(Value::as_str).unwrap_or("").to_string();
                let data_type = row
                    .get("type")
                    .and_then(Value::as_str)
                    .filter(|t| !t.is_empty())
                    .unwrap_or("TEXT")
                    .to_string();
                let not_null = row.get("notnull").and_then(Value::as_i64).unwrap_or(0) != 0;
                let default_value = row
                    .get("dflt_value")
                    .filter(|v| !v.is_null())
                    .map(Value::display_text);
                let is_primary_key = row.get("pk").and_then(Value::as_i64).unwrap_or(0) > 0;
                // INTEGER PRIMARY KEY aliases the rowid
                let is_rowid_alias = is_primary_key && data_type.eq_ignore_ascii_case("INTEGER");

                let mut column = ColumnMeta::new(name, data_type);
                if not_null {
                    column = column.not_null();
                }
                if let Some(default) = default_value {
                    column = column.with_default(default);
                }
                if is_primary_key {
                    column = column.primary_key();
                }
                if is_rowid_alias {
                    column = column.auto_increment();
                }
                if foreign_keys.contains(&column.name) {
                    column = column.foreign_key();
                }
                column
            })
            .collect();

        Ok(columns)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_rows(&self, schema: &str, table: &str, limit: usize) -> Result<Vec<Row>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_rows(
            &format!("SELECT * FROM {}.{} LIMIT ?", quote(schema), quote(table)),
            &[Value::Int64(limit)],
        )
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.query_rows(sql, params)
    }
}
