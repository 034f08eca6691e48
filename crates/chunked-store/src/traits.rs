use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chunked_types::ObjectMetadata;

use crate::error::StoreResult;

/// Chunk size used when neither the caller nor the provider picks one (16 KiB).
pub const DEFAULT_CHUNK_SIZE: u32 = 0x4000;

/// Backend capability consumed by the chunked storage engine.
///
/// Addresses one record per `(object, chunk index)` and one metadata record
/// per object. Implementations must satisfy these rules:
/// - Calls are independent. The engine assumes no transaction spans two
///   calls and supplies its own ordering on top.
/// - A missing record is `Ok(None)`, never an error.
/// - Deleting a record that does not exist succeeds.
/// - All backend failures are propagated, never silently ignored.
#[async_trait]
pub trait ChunkedStorageProvider: Send + Sync {
    /// Read chunk `index` of `object`.
    async fn get_chunk(&self, object: &str, index: u32) -> StoreResult<Option<Bytes>>;

    /// Write chunk `index` of `object`, replacing any previous value.
    async fn put_chunk(
        &self,
        object: &str,
        index: u32,
        data: Bytes,
        ttl: Option<Duration>,
    ) -> StoreResult<()>;

    /// Delete chunk `index` of `object`.
    async fn delete_chunk(&self, object: &str, index: u32) -> StoreResult<()>;

    /// Read the metadata record of `object`.
    async fn get_metadata(&self, object: &str) -> StoreResult<Option<ObjectMetadata>>;

    /// Write the metadata record of `object`. The record expires after
    /// `metadata.ttl` when set.
    ///
    /// Readers must observe either the previous record or the complete new
    /// one, never a mix of both.
    async fn put_metadata(&self, object: &str, metadata: &ObjectMetadata) -> StoreResult<()>;

    /// Delete the metadata record of `object`.
    async fn delete_metadata(&self, object: &str) -> StoreResult<()>;

    /// Chunk size the writer falls back to when none is configured.
    fn default_chunk_size(&self) -> u32 {
        DEFAULT_CHUNK_SIZE
    }
}

/// Column values of one row, keyed by column name.
pub type Row = BTreeMap<String, Bytes>;

/// Column-oriented key/value store: rows addressed by a string key, each
/// holding named byte columns with an optional time-to-live.
///
/// - Expired cells behave exactly like absent ones.
/// - `put_row` applies all of its columns atomically with respect to readers
///   of that row.
/// - `delete_row` and `delete_columns` are idempotent.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read all live columns of `row`. Returns `Ok(None)` if none exist.
    async fn get_row(&self, row: &str) -> StoreResult<Option<Row>>;

    /// Merge `columns` into `row`, each expiring after `ttl` when set.
    async fn put_row(&self, row: &str, columns: Row, ttl: Option<Duration>) -> StoreResult<()>;

    /// Remove `row` and every column in it.
    async fn delete_row(&self, row: &str) -> StoreResult<()>;

    /// Remove the named columns of `row`, leaving its other columns in
    /// place. A row left without columns disappears. Idempotent.
    async fn delete_columns(&self, row: &str, columns: &[&str]) -> StoreResult<()>;

    /// Read a single column.
    ///
    /// Default implementation reads the whole row. Backends may override
    /// for fewer bytes moved.
    async fn get(&self, row: &str, column: &str) -> StoreResult<Option<Bytes>> {
        Ok(self
            .get_row(row)
            .await?
            .and_then(|mut cells| cells.remove(column)))
    }

    /// Write a single column.
    async fn put(
        &self,
        row: &str,
        column: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> StoreResult<()> {
        let mut cells = Row::new();
        cells.insert(column.to_string(), value);
        self.put_row(row, cells, ttl).await
    }
}
