//! Time-bounded cache of fetched tables

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tabula_core::{ColumnMeta, Row, TableId};
use tokio::time::Instant;

/// Columns and rows fetched for one table
#[derive(Debug, Clone)]
pub struct CachedTable {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Row>,
    pub row_limit: usize,
    pub cached_at: Instant,
}

/// Cache of table fetches keyed by `schema.table`
pub struct SnapshotCache {
    cache: RwLock<HashMap<TableId, CachedTable>>,
    ttl: Duration,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// A fresh entry fetched with at least `row_limit` rows
    pub fn get(&self, table: &TableId, row_limit: usize) -> Option<CachedTable> {
        let cache = self.cache.read();
        let result = cache
            .get(table)
            .filter(|c| c.cached_at.elapsed() < self.ttl && c.row_limit >= row_limit)
            .cloned();
        if result.is_some() {
            tracing::debug!(table = %table, "cache hit for table snapshot");
        } else {
            tracing::debug!(table = %table, "cache miss for table snapshot");
        }
        result
    }

    pub fn put(&self, table: TableId, columns: Vec<ColumnMeta>, rows: Vec<Row>, row_limit: usize) {
        self.cache.write().insert(
            table,
            CachedTable {
                columns,
                rows,
                row_limit,
                cached_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, table: &TableId) {
        if self.cache.write().remove(table).is_some() {
            tracing::debug!(table = %table, "invalidated table snapshot cache");
        }
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}
