use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;

use crate::error::StoreResult;
use crate::traits::{RecordStore, Row};

#[derive(Clone, Debug)]
struct Cell {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl Cell {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-memory, HashMap-based record store.
///
/// Intended for tests and embedding. Rows are held behind a `RwLock`; values
/// are reference-counted `Bytes`, so reads never copy payloads. Expiry is
/// measured on the tokio clock, which tests can pause and advance.
pub struct InMemoryRecordStore {
    rows: RwLock<HashMap<String, BTreeMap<String, Cell>>>,
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }

    /// Number of rows holding at least one live column.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.rows
            .read()
            .expect("lock poisoned")
            .values()
            .filter(|cells| cells.values().any(|c| c.is_live(now)))
            .count()
    }

    /// Returns `true` if no row holds a live column.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted keys of all rows holding at least one live column.
    pub fn row_keys(&self) -> Vec<String> {
        let now = Instant::now();
        let rows = self.rows.read().expect("lock poisoned");
        let mut keys: Vec<String> = rows
            .iter()
            .filter(|(_, cells)| cells.values().any(|c| c.is_live(now)))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drop expired cells and rows left empty. Returns the number of cells
    /// removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut rows = self.rows.write().expect("lock poisoned");
        let mut removed = 0;
        rows.retain(|_, cells| {
            let before = cells.len();
            cells.retain(|_, c| c.is_live(now));
            removed += before - cells.len();
            !cells.is_empty()
        });
        removed
    }

    /// Remove all rows.
    pub fn clear(&self) {
        self.rows.write().expect("lock poisoned").clear();
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_row(&self, row: &str) -> StoreResult<Option<Row>> {
        let now = Instant::now();
        let rows = self.rows.read().expect("lock poisoned");
        let live: Row = match rows.get(row) {
            Some(cells) => cells
                .iter()
                .filter(|(_, c)| c.is_live(now))
                .map(|(name, c)| (name.clone(), c.value.clone()))
                .collect(),
            None => return Ok(None),
        };
        Ok(if live.is_empty() { None } else { Some(live) })
    }

    async fn put_row(&self, row: &str, columns: Row, ttl: Option<Duration>) -> StoreResult<()> {
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        let mut rows = self.rows.write().expect("lock poisoned");
        let cells = rows.entry(row.to_string()).or_default();
        for (name, value) in columns {
            cells.insert(name, Cell { value, expires_at });
        }
        Ok(())
    }

    async fn delete_row(&self, row: &str) -> StoreResult<()> {
        self.rows.write().expect("lock poisoned").remove(row);
        Ok(())
    }

    async fn delete_columns(&self, row: &str, columns: &[&str]) -> StoreResult<()> {
        let mut rows = self.rows.write().expect("lock poisoned");
        if let Some(cells) = rows.get_mut(row) {
            for column in columns {
                cells.remove(*column);
            }
            if cells.is_empty() {
                rows.remove(row);
            }
        }
        Ok(())
    }

    async fn get(&self, row: &str, column: &str) -> StoreResult<Option<Bytes>> {
        let now = Instant::now();
        let rows = self.rows.read().expect("lock poisoned");
        Ok(rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .filter(|c| c.is_live(now))
            .map(|c| c.value.clone()))
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryRecordStore")
            .field("row_count", &count)
            .finish()
    }
}
