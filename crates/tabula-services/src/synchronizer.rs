//! Mutation synchronizer
//!
//! Turns one committed cell value into exactly one INSERT or UPDATE against
//! a [`PersistenceGateway`] and hands back the row the store reports.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tabula_core::{
    CellAddress, ColumnMeta, PersistenceGateway, Row, Statement, TableId, TableSnapshot, TypeFamily,
    Value,
};

use crate::cache::SnapshotCache;
use crate::error::{ServiceError, ServiceResult};

/// What to write into a cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellWrite {
    Set(Value),
    /// Keep the current value (UPDATE) or let the store fill its default
    /// (INSERT). Produced when a NOT NULL column with a non-literal default
    /// is cleared.
    LeaveDefault,
}

/// One cell write ready to be synchronized
#[derive(Debug, Clone, PartialEq)]
pub struct CellMutation {
    pub address: CellAddress,
    pub write: CellWrite,
    /// Key value captured before the optimistic edit, when the row had one
    pub key: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationPlan {
    Skip(&'static str),
    Insert(Statement),
    Update(Statement),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    Skipped,
    Inserted(Row),
    Updated(Row),
}

impl MutationOutcome {
    pub fn row(&self) -> Option<&Row> {
        match self {
            MutationOutcome::Skipped => None,
            MutationOutcome::Inserted(row) | MutationOutcome::Updated(row) => Some(row),
        }
    }
}

pub struct MutationSynchronizer {
    gateway: Arc<dyn PersistenceGateway>,
    cache: Arc<SnapshotCache>,
    timeout: Option<Duration>,
}

impl MutationSynchronizer {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, cache: Arc<SnapshotCache>) -> Self {
        Self {
            gateway,
            cache,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn driver_name(&self) -> &str {
        self.gateway.driver_name()
    }

    /// Build the statement for a mutation against the current snapshot.
    pub fn plan(&self, snapshot: &TableSnapshot, mutation: &CellMutation) -> ServiceResult<MutationPlan> {
        let driver = self.gateway.driver_name();
        let addr = &mutation.address;
        let column = snapshot
            .column(&addr.column)
            .ok_or_else(|| ServiceError::NotFound(format!("column '{}'", addr.column)))?;
        if snapshot.row(addr.row).is_none() {
            return Ok(MutationPlan::Skip("row no longer exists"));
        }

        let key_column = snapshot.primary_key_column();
        let key = mutation.key.clone().or_else(|| {
            if addr.column == key_column {
                None
            } else {
                snapshot.key_value(addr.row).cloned()
            }
        });

        let table = qualified_table_name(snapshot.table(), driver);
        match key {
            Some(key) => {
                let CellWrite::Set(value) = &mutation.write else {
                    return Ok(MutationPlan::Skip("column keeps its current value"));
                };
                let sql = format!(
                    "UPDATE {} SET {} = {} WHERE {} = {} RETURNING *",
                    table,
                    quote_identifier(&column.name, driver),
                    param_placeholder(driver, 1),
                    quote_identifier(key_column, driver),
                    param_placeholder(driver, 2),
                );
                Ok(MutationPlan::Update(Statement::new(sql, vec![value.clone(), key])))
            }
            None => {
                let mut columns = Vec::new();
                let mut params = Vec::new();
                if let CellWrite::Set(value) = &mutation.write {
                    columns.push(quote_identifier(&column.name, driver));
                    params.push(value.clone());
                }
                for other in snapshot.columns() {
                    if other.name == column.name || !needs_placeholder(other) {
                        continue;
                    }
                    columns.push(quote_identifier(&other.name, driver));
                    params.push(minimal_value(other));
                }

                let sql = if columns.is_empty() {
                    format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table)
                } else {
                    let placeholders: Vec<String> = (1..=columns.len())
                        .map(|i| param_placeholder(driver, i))
                        .collect();
                    format!(
                        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                        table,
                        columns.join(", "),
                        placeholders.join(", ")
                    )
                };
                Ok(MutationPlan::Insert(Statement::new(sql, params)))
            }
        }
    }

    /// Run a planned statement and return the authoritative row.
    #[tracing::instrument(skip(self, table, plan), fields(table = %table))]
    pub async fn execute(&self, table: &TableId, plan: MutationPlan) -> ServiceResult<MutationOutcome> {
        let (statement, inserting) = match plan {
            MutationPlan::Skip(reason) => {
                tracing::debug!(reason, "skipping mutation");
                return Ok(MutationOutcome::Skipped);
            }
            MutationPlan::Insert(statement) => (statement, true),
            MutationPlan::Update(statement) => (statement, false),
        };

        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "executing mutation");

        let result = with_timeout(self.timeout, "mutation", self.gateway.execute_statement(&statement)).await;
        let mut rows = match result {
            Ok(rows) => rows,
            Err(ServiceError::Timeout(msg)) => return Err(ServiceError::Timeout(msg)),
            Err(e) if inserting => return Err(ServiceError::Resolution(e.to_string())),
            Err(e) => return Err(ServiceError::Mutation(e.to_string())),
        };

        if rows.is_empty() {
            let msg = "No rows matched - the row may have been modified or deleted".to_string();
            return Err(if inserting {
                ServiceError::Resolution(msg)
            } else {
                ServiceError::Mutation(msg)
            });
        }

        self.cache.invalidate(table);
        let row = rows.swap_remove(0);
        tracing::info!(
            table = %table,
            kind = if inserting { "insert" } else { "update" },
            "Cell synchronized successfully"
        );
        Ok(if inserting {
            MutationOutcome::Inserted(row)
        } else {
            MutationOutcome::Updated(row)
        })
    }

    /// Plan and execute in one step
    pub async fn apply(
        &self,
        snapshot: &TableSnapshot,
        mutation: &CellMutation,
    ) -> ServiceResult<MutationOutcome> {
        let plan = self.plan(snapshot, mutation)?;
        self.execute(snapshot.table(), plan).await
    }
}

/// Await a gateway future, optionally bounded by a timeout.
pub(crate) async fn with_timeout<T, F>(
    timeout: Option<Duration>,
    what: &str,
    fut: F,
) -> ServiceResult<T>
where
    F: Future<Output = tabula_core::Result<T>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => Err(ServiceError::Timeout(format!(
                "{what} exceeded {}ms",
                limit.as_millis()
            ))),
        },
        None => fut.await.map_err(ServiceError::from),
    }
}

/// NOT NULL columns the store cannot fill on its own
fn needs_placeholder(column: &ColumnMeta) -> bool {
    !column.nullable && !column.has_default() && !column.is_auto_generated()
}

/// Type-appropriate non-NULL value for a NOT NULL column
pub fn minimal_value(column: &ColumnMeta) -> Value {
    let now = chrono::Local::now().naive_local();
    match column.type_family() {
        TypeFamily::Integer => Value::Int64(0),
        TypeFamily::Numeric => Value::Int64(0),
        TypeFamily::Boolean => Value::Bool(false),
        TypeFamily::Json => Value::Json(serde_json::json!({})),
        TypeFamily::Date => Value::Date(now.date()),
        TypeFamily::Time => Value::Time(now.time()),
        TypeFamily::Timestamp => Value::DateTime(now),
        TypeFamily::Uuid => Value::Uuid(uuid::Uuid::new_v4()),
        TypeFamily::Binary => Value::Bytes(Vec::new()),
        TypeFamily::Text | TypeFamily::Other => Value::String(String::new()),
    }
}

/// Value of a default expression that is a plain literal such as `0`,
/// `'x'`, `'x'::text`, `(1.5)` or `true`. Function calls and keywords such
/// as `now()` or `CURRENT_TIMESTAMP` are not literals.
pub fn literal_default(expression: &str) -> Option<Value> {
    let mut expr = expression.trim();
    while let Some(inner) = expr.strip_prefix('(').and_then(|e| e.strip_suffix(')')) {
        expr = inner.trim();
    }
    // drop a trailing cast like ::text or ::character varying
    if let Some(idx) = expr.rfind("::") {
        if !expr[idx..].contains('\'') {
            expr = expr[..idx].trim();
        }
    }

    if let Some(quoted) = expr.strip_prefix('\'').and_then(|e| e.strip_suffix('\'')) {
        return Some(Value::String(quoted.replace("''", "'")));
    }
    if let Ok(i) = expr.parse::<i64>() {
        return Some(Value::Int64(i));
    }
    if let Ok(f) = expr.parse::<f64>() {
        if f.is_finite() {
            return Some(Value::Float64(f));
        }
    }
    match expr.to_lowercase().as_str() {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => None,
    }
}

/// What clearing a cell writes: NULL when allowed, else the column's
/// default, else a minimal value.
pub fn resolve_clear(column: &ColumnMeta) -> CellWrite {
    if column.nullable {
        return CellWrite::Set(Value::Null);
    }
    if column.is_auto_generated() {
        return CellWrite::LeaveDefault;
    }
    if let Some(default) = column.default_value.as_deref().filter(|d| !d.trim().is_empty()) {
        return match literal_default(default) {
            Some(value) => CellWrite::Set(value),
            None => CellWrite::LeaveDefault,
        };
    }
    CellWrite::Set(minimal_value(column))
}

/// Parse non-blank input text using the column's declared type.
///
/// Text that doesn't fit the type stays a string and the store decides.
pub fn parse_input(text: &str, column: &ColumnMeta) -> Value {
    match column.type_family() {
        TypeFamily::Boolean => match text.trim().to_lowercase().as_str() {
            "true" | "t" | "1" | "yes" | "y" | "on" => Value::Bool(true),
            "false" | "f" | "0" | "no" | "n" | "off" => Value::Bool(false),
            _ => Value::String(text.to_string()),
        },
        TypeFamily::Integer => text
            .trim()
            .parse::<i64>()
            .map(Value::Int64)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        TypeFamily::Numeric => match text.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float64(f),
            _ => Value::String(text.to_string()),
        },
        TypeFamily::Json => serde_json::from_str(text)
            .map(Value::Json)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        TypeFamily::Uuid => uuid::Uuid::parse_str(text.trim())
            .map(Value::Uuid)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        _ => Value::String(text.to_string()),
    }
}

/// Quote an identifier in the driver's style
pub fn quote_identifier(identifier: &str, driver_name: &str) -> String {
    match driver_name {
        "mysql" | "mariadb" => format!("`{}`", identifier.replace('`', "``")),
        "mssql" | "sqlserver" => format!("[{}]", identifier.replace(']', "]]")),
        _ => format!("\"{}\"", identifier.replace('"', "\"\"")),
    }
}

fn qualified_table_name(table: &TableId, driver_name: &str) -> String {
    format!(
        "{}.{}",
        quote_identifier(&table.schema, driver_name),
        quote_identifier(&table.table, driver_name)
    )
}

fn param_placeholder(driver_name: &str, index: usize) -> String {
    if matches!(driver_name, "postgresql" | "postgres") {
        format!("${}", index)
    } else {
        "?".to_string()
    }
}
