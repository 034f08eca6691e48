use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chunked_types::{chunk_key, ObjectMetadata};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::traits::{ChunkedStorageProvider, RecordStore, Row, DEFAULT_CHUNK_SIZE};

/// Column names used to lay out chunk and metadata rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    /// Column holding a chunk's bytes.
    pub data: String,
    pub object_size: String,
    pub chunk_size: String,
    pub chunk_count: String,
    /// Time-to-live of the write, in milliseconds.
    pub ttl: String,
    pub attributes: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            data: "data".into(),
            object_size: "objectsize".into(),
            chunk_size: "chunksize".into(),
            chunk_count: "chunkcount".into(),
            ttl: "ttl".into(),
            attributes: "attributes".into(),
        }
    }
}

/// [`ChunkedStorageProvider`] over any column-oriented [`RecordStore`].
///
/// Layout:
/// - chunk `i` of object `name` lives in row `"name$i"`, column `data`;
/// - the metadata of `name` lives in row `"name"`, one column per field,
///   numbers encoded as decimal ASCII.
///
/// The metadata row is written with a single `put_row`, so readers see it
/// all at once. The row of chunk `i` of `name` is also the metadata row of an
/// object called `"name$i"`; deletes only remove their own columns so the two
/// never clobber each other.
pub struct RecordChunkedStorageProvider<S> {
    store: S,
    columns: ColumnNames,
    default_chunk_size: u32,
}

impl<S: RecordStore> RecordChunkedStorageProvider<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            columns: ColumnNames::default(),
            default_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_columns(mut self, columns: ColumnNames) -> Self {
        self.columns = columns;
        self
    }

    /// Override the fallback chunk size. Zero is ignored.
    pub fn with_default_chunk_size(mut self, chunk_size: u32) -> Self {
        if chunk_size > 0 {
            self.default_chunk_size = chunk_size;
        }
        self
    }

    /// The underlying record store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn columns(&self) -> &ColumnNames {
        &self.columns
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn encode_metadata(&self, metadata: &ObjectMetadata) -> Row {
        let c = &self.columns;
        let mut row = Row::new();
        row.insert(c.object_size.clone(), decimal(metadata.object_size));
        row.insert(c.chunk_size.clone(), decimal(u64::from(metadata.chunk_size)));
        row.insert(c.chunk_count.clone(), decimal(u64::from(metadata.chunk_count)));
        // Optional columns are always written so an overwrite clears them.
        let ttl = metadata
            .ttl
            .map(|ttl| decimal(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)))
            .unwrap_or_default();
        let attributes = metadata
            .attributes
            .clone()
            .map(Bytes::from)
            .unwrap_or_default();
        row.insert(c.ttl.clone(), ttl);
        row.insert(c.attributes.clone(), attributes);
        row
    }

    fn metadata_columns(&self) -> [&str; 5] {
        let c = &self.columns;
        [
            c.object_size.as_str(),
            c.chunk_size.as_str(),
            c.chunk_count.as_str(),
            c.ttl.as_str(),
            c.attributes.as_str(),
        ]
    }

    fn decode_metadata(&self, object: &str, row: &Row) -> StoreResult<Option<ObjectMetadata>> {
        let c = &self.columns;
        let required = [&c.object_size, &c.chunk_size, &c.chunk_count];
        let present = required.iter().filter(|name| row.contains_key(**name)).count();
        if present == 0 {
            // Not a metadata row (e.g. a chunk row whose key equals `object`).
            return Ok(None);
        }
        if present < required.len() {
            return Err(corrupt(object, "metadata row is missing required columns"));
        }

        let object_size = parse_decimal(object, &c.object_size, &row[&c.object_size])?;
        let chunk_size = narrow(object, &c.chunk_size, &row[&c.chunk_size])?;
        let chunk_count = narrow(object, &c.chunk_count, &row[&c.chunk_count])?;
        let ttl = optional(row, &c.ttl)
            .map(|v| parse_decimal(object, &c.ttl, v).map(Duration::from_millis))
            .transpose()?;
        let attributes = optional(row, &c.attributes)
            .map(|v| {
                String::from_utf8(v.to_vec())
                    .map_err(|_| corrupt(object, "attributes are not valid UTF-8"))
            })
            .transpose()?;

        Ok(Some(
            ObjectMetadata::new(object, object_size, chunk_size, chunk_count)
                .with_ttl(ttl)
                .with_attributes(attributes),
        ))
    }
}

#[async_trait]
impl<S: RecordStore> ChunkedStorageProvider for RecordChunkedStorageProvider<S> {
    async fn get_chunk(&self, object: &str, index: u32) -> StoreResult<Option<Bytes>> {
        self.store
            .get(&chunk_key(object, index), &self.columns.data)
            .await
    }

    async fn put_chunk(
        &self,
        object: &str,
        index: u32,
        data: Bytes,
        ttl: Option<Duration>,
    ) -> StoreResult<()> {
        self.store
            .put(&chunk_key(object, index), &self.columns.data, data, ttl)
            .await
    }

    async fn delete_chunk(&self, object: &str, index: u32) -> StoreResult<()> {
        self.store
            .delete_columns(&chunk_key(object, index), &[self.columns.data.as_str()])
            .await
    }

    async fn get_metadata(&self, object: &str) -> StoreResult<Option<ObjectMetadata>> {
        match self.store.get_row(object).await? {
            Some(row) => self.decode_metadata(object, &row),
            None => Ok(None),
        }
    }

    async fn put_metadata(&self, object: &str, metadata: &ObjectMetadata) -> StoreResult<()> {
        let row = self.encode_metadata(metadata);
        self.store.put_row(object, row, metadata.ttl).await
    }

    async fn delete_metadata(&self, object: &str) -> StoreResult<()> {
        self.store
            .delete_columns(object, &self.metadata_columns())
            .await
    }

    fn default_chunk_size(&self) -> u32 {
        self.default_chunk_size
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for RecordChunkedStorageProvider<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordChunkedStorageProvider")
            .field("store", &self.store)
            .field("default_chunk_size", &self.default_chunk_size)
            .finish()
    }
}

/// An optional column; empty values mean "not set".
fn optional<'r>(row: &'r Row, column: &str) -> Option<&'r Bytes> {
    row.get(column).filter(|v| !v.is_empty())
}

fn decimal(value: u64) -> Bytes {
    Bytes::from(value.to_string())
}

fn parse_decimal(object: &str, column: &str, value: &[u8]) -> StoreResult<u64> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| corrupt(object, &format!("column {column} is not a decimal number")))
}

fn narrow(object: &str, column: &str, value: &[u8]) -> StoreResult<u32> {
    let wide = parse_decimal(object, column, value)?;
    u32::try_from(wide).map_err(|_| corrupt(object, &format!("column {column} out of range")))
}

fn corrupt(object: &str, reason: &str) -> StoreError {
    StoreError::CorruptRecord {
        row: object.to_string(),
        reason: reason.to_string(),
    }
}
