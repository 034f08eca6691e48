use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReadError, ReadResult, WriteError, WriteResult};

/// Chunk writes in flight at once, unless configured otherwise.
pub const DEFAULT_WRITE_CONCURRENCY: usize = 4;

/// Chunk indices fetched per read wave, unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 11;

/// Chunk fetches in flight at once within a batch, unless configured otherwise.
pub const DEFAULT_READ_CONCURRENCY: usize = 4;

/// Configuration for an [`ObjectWriter`](crate::ObjectWriter).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Maximum bytes per chunk. `None` uses the provider's default.
    pub chunk_size: Option<u32>,
    /// Maximum number of chunk writes in flight.
    pub concurrency_level: usize,
    /// Expiry applied to every chunk and to the metadata.
    pub ttl: Option<Duration>,
    /// Deadline for the whole write. `None` waits indefinitely.
    pub max_wait: Option<Duration>,
    /// Opaque attributes stored with the metadata.
    pub attributes: Option<String>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            chunk_size: None,
            concurrency_level: DEFAULT_WRITE_CONCURRENCY,
            ttl: None,
            max_wait: None,
            attributes: None,
        }
    }
}

impl WriterConfig {
    pub fn validate(&self) -> WriteResult<()> {
        if self.chunk_size == Some(0) {
            return Err(WriteError::InvalidConfig("chunk_size must be > 0".into()));
        }
        if self.concurrency_level == 0 {
            return Err(WriteError::InvalidConfig(
                "concurrency_level must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for an [`ObjectReader`](crate::ObjectReader).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Number of chunk indices grouped into one fetch wave. Bounds the
    /// number of chunks buffered in memory.
    pub batch_size: usize,
    /// Maximum number of chunk fetches in flight within a batch.
    pub concurrency_level: usize,
    /// Deadline for the whole read. `None` waits indefinitely.
    pub max_wait: Option<Duration>,
    /// Issue the fetches of each batch in random order.
    pub randomize_order: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency_level: DEFAULT_READ_CONCURRENCY,
            max_wait: None,
            randomize_order: false,
        }
    }
}

impl ReaderConfig {
    pub fn validate(&self) -> ReadResult<()> {
        if self.batch_size == 0 {
            return Err(ReadError::InvalidConfig("batch_size must be > 0".into()));
        }
        if self.concurrency_level == 0 {
            return Err(ReadError::InvalidConfig(
                "concurrency_level must be > 0".into(),
            ));
        }
        Ok(())
    }
}
