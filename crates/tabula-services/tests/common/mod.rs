//! In-memory gateway for editor tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use tabula_core::{ColumnMeta, PersistenceGateway, Result, Row, Statement, TabulaError, TableId, Value};
use tabula_services::{EditorConfig, SnapshotCache, TableEditor};

/// Executes the editor's UPDATE/INSERT statements against a row vector
pub struct MockGateway {
    driver: String,
    columns: Vec<ColumnMeta>,
    rows: Mutex<Vec<Row>>,
    statements: Mutex<Vec<Statement>>,
    failure: Mutex<Option<String>>,
    match_nothing: Mutex<bool>,
    delay: Mutex<Option<Duration>>,
    next_id: AtomicI64,
    fetches: AtomicUsize,
}

impl MockGateway {
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Row>) -> Self {
        let max_id = rows
            .iter()
            .filter_map(|r| r.get("id").and_then(Value::as_i64))
            .max()
            .unwrap_or(0);
        Self {
            driver: "sqlite".to_string(),
            columns,
            rows: Mutex::new(rows),
            statements: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            match_nothing: Mutex::new(false),
            delay: Mutex::new(None),
            next_id: AtomicI64::new(max_id + 1),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_driver(mut self, driver: &str) -> Self {
        self.driver = driver.to_string();
        self
    }

    /// Every subsequent statement fails with `message`
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    /// UPDATEs report zero affected rows
    pub fn match_nothing(&self) {
        *self.match_nothing.lock() = true;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().clone()
    }

    pub fn statement_count(&self) -> usize {
        self.statements.lock().len()
    }

    pub fn stored_rows(&self) -> Vec<Row> {
        self.rows.lock().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn default_for(column: &ColumnMeta) -> Value {
        match column.default_value.as_deref() {
            Some(d) => d
                .trim()
                .parse::<i64>()
                .map(Value::Int64)
                .unwrap_or_else(|_| Value::String(d.trim_matches('\'').to_string())),
            None => Value::Null,
        }
    }

    fn new_row(&self) -> Row {
        let mut row = Row::from_pairs(
            self.columns
                .iter()
                .filter(|c| !c.is_auto_generated())
                .map(|c| (c.name.clone(), Self::default_for(c))),
        );
        for column in self.columns.iter().filter(|c| c.is_auto_generated()) {
            row.set(
                column.name.clone(),
                Value::Int64(self.next_id.fetch_add(1, Ordering::SeqCst)),
            );
        }
        // keep declaration order
        Row::from_pairs(self.columns.iter().map(|c| {
            (
                c.name.clone(),
                row.get(&c.name).cloned().unwrap_or(Value::Null),
            )
        }))
    }

    fn run(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let update = Regex::new(r#"^UPDATE \S+ SET "([^"]+)" = \? WHERE "([^"]+)" = \?"#)
            .map_err(|e| TabulaError::Other(e.to_string()))?;
        let insert = Regex::new(r#"^INSERT INTO \S+ \((.*)\) VALUES"#)
            .map_err(|e| TabulaError::Other(e.to_string()))?;

        if let Some(caps) = update.captures(sql) {
            if *self.match_nothing.lock() {
                return Ok(Vec::new());
            }
            let mut rows = self.rows.lock();
            let Some(row) = rows
                .iter_mut()
                .find(|r| r.get(&caps[2]) == params.get(1))
            else {
                return Ok(Vec::new());
            };
            row.set(caps[1].to_string(), params[0].clone());
            return Ok(vec![row.clone()]);
        }

        if sql.contains("DEFAULT VALUES") {
            let row = self.new_row();
            self.rows.lock().push(row.clone());
            return Ok(vec![row]);
        }

        if let Some(caps) = insert.captures(sql) {
            let mut row = self.new_row();
            for (name, value) in caps[1].split(", ").zip(params) {
                row.set(name.trim_matches('"').to_string(), value.clone());
            }
            self.rows.lock().push(row.clone());
            return Ok(vec![row]);
        }

        Err(TabulaError::Query(format!("unsupported statement: {sql}")))
    }
}

#[async_trait]
impl PersistenceGateway for MockGateway {
    fn driver_name(&self) -> &str {
        &self.driver
    }

    async fn fetch_columns(&self, _schema: &str, _table: &str) -> Result<Vec<ColumnMeta>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.columns.clone())
    }

    async fn fetch_rows(&self, _schema: &str, _table: &str, limit: usize) -> Result<Vec<Row>> {
        Ok(self.rows.lock().iter().take(limit).cloned().collect())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.statements
            .lock()
            .push(Statement::new(sql, params.to_vec()));
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failure.lock().clone();
        if let Some(message) = failure {
            return Err(TabulaError::Query(message));
        }
        self.run(sql, params)
    }
}

/// `T(id integer pk, name text null, score integer not null default 0)`
pub fn scores_columns() -> Vec<ColumnMeta> {
    vec![
        ColumnMeta::new("id", "integer").primary_key().auto_increment(),
        ColumnMeta::new("name", "text"),
        ColumnMeta::new("score", "integer").not_null().with_default("0"),
    ]
}

pub fn scores_rows() -> Vec<Row> {
    vec![
        Row::new().with("id", 1i64).with("name", "Ana").with("score", 1i64),
        Row::new().with("id", 2i64).with("name", "Bruno").with("score", 2i64),
        Row::new().with("id", 3i64).with("name", Value::Null).with("score", 3i64),
    ]
}

pub fn scores_gateway() -> Arc<MockGateway> {
    Arc::new(MockGateway::new(scores_columns(), scores_rows()))
}

/// Five text columns `id, a, b, c, d` with two filled rows
pub fn letters_gateway() -> Arc<MockGateway> {
    let columns = vec![
        ColumnMeta::new("id", "integer").primary_key().auto_increment(),
        ColumnMeta::new("a", "text"),
        ColumnMeta::new("b", "text"),
        ColumnMeta::new("c", "text"),
        ColumnMeta::new("d", "text"),
    ];
    let rows = vec![
        Row::new()
            .with("id", 1i64)
            .with("a", "a1")
            .with("b", "b1")
            .with("c", Value::Null)
            .with("d", Value::Null),
        Row::new()
            .with("id", 2i64)
            .with("a", "a2")
            .with("b", "b2")
            .with("c", Value::Null)
            .with("d", Value::Null),
    ];
    Arc::new(MockGateway::new(columns, rows))
}

pub async fn open_with(gateway: Arc<MockGateway>, config: EditorConfig) -> (TableEditor, Arc<SnapshotCache>) {
    let cache = Arc::new(SnapshotCache::default());
    let editor = TableEditor::open(gateway, Arc::clone(&cache), TableId::new("main", "t"), config)
        .await
        .expect("open table");
    (editor, cache)
}

pub async fn open(gateway: Arc<MockGateway>) -> TableEditor {
    open_with(gateway, EditorConfig::default()).await.0
}
