use std::time::Duration;

use chunked_store::StoreError;
use chunked_types::TypeError;
use thiserror::Error;

/// Error raised by a [`WriteCallback`](crate::WriteCallback) hook to abort a
/// chunk.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Why a single chunk could not be persisted.
#[derive(Debug, Error)]
pub enum ChunkFault {
    #[error("callback aborted the chunk: {0}")]
    Callback(#[source] CallbackError),

    #[error("chunk write failed: {0}")]
    Store(#[from] StoreError),
}

/// A failed write. The object's metadata was not committed, so the object
/// is not visible to readers.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("invalid writer configuration: {0}")]
    InvalidConfig(String),

    #[error("reading input for {object} failed at chunk {index}: {source}")]
    Input {
        object: String,
        index: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("chunk {index} of {object} failed: {source}")]
    Chunk {
        object: String,
        index: u32,
        #[source]
        source: ChunkFault,
    },

    #[error("committing metadata for {object} failed: {source}")]
    Metadata {
        object: String,
        #[source]
        source: StoreError,
    },

    #[error("{object} needs more than {} chunks", u32::MAX)]
    TooManyChunks { object: String },

    #[error("write of {object} was cancelled")]
    Cancelled { object: String },

    #[error("write of {object} timed out after {after:?}")]
    TimedOut { object: String, after: Duration },
}

impl WriteError {
    /// Index of the failing chunk, for chunk-level faults.
    pub fn chunk_index(&self) -> Option<u32> {
        match self {
            Self::Chunk { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Returns `true` if the failure was a chunk-level fault, already
    /// reported through `on_chunk_exception`.
    pub fn is_chunk_fault(&self) -> bool {
        matches!(self, Self::Chunk { .. })
    }
}

/// A failed read or metadata lookup.
///
/// After a failed read the output sink holds an unspecified prefix of the
/// object and must be discarded.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("invalid reader configuration: {0}")]
    InvalidConfig(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("loading metadata for {object} failed: {source}")]
    Metadata {
        object: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    InvalidMetadata(#[from] TypeError),

    #[error("chunk {index} of {object} is unavailable")]
    ChunkUnavailable {
        object: String,
        index: u32,
        #[source]
        source: Option<StoreError>,
    },

    #[error("{object}: expected {expected} bytes{}, got {actual}", chunk_suffix(.index))]
    SizeMismatch {
        object: String,
        index: Option<u32>,
        expected: u64,
        actual: u64,
    },

    #[error("writing {object} to the output failed: {source}")]
    Output {
        object: String,
        #[source]
        source: std::io::Error,
    },

    #[error("read of {object} was cancelled")]
    Cancelled { object: String },

    #[error("read of {object} timed out after {after:?}")]
    TimedOut { object: String, after: Duration },
}

impl ReadError {
    /// Index of the chunk that could not be fetched or did not match.
    pub fn chunk_index(&self) -> Option<u32> {
        match self {
            Self::ChunkUnavailable { index, .. } => Some(*index),
            Self::SizeMismatch { index, .. } => *index,
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// A failed delete. Chunks deleted before the failure stay deleted; the
/// metadata is only removed once every chunk is gone.
#[derive(Debug, Error)]
pub enum DeleteError {
    #[error(transparent)]
    Lookup(#[from] ReadError),

    #[error("deleting chunk {index} of {object} failed: {source}")]
    Chunk {
        object: String,
        index: u32,
        #[source]
        source: StoreError,
    },

    #[error("deleting metadata for {object} failed: {source}")]
    Metadata {
        object: String,
        #[source]
        source: StoreError,
    },
}

impl DeleteError {
    pub fn chunk_index(&self) -> Option<u32> {
        match self {
            Self::Chunk { index, .. } => Some(*index),
            _ => None,
        }
    }
}

fn chunk_suffix(index: &Option<u32>) -> String {
    index.map(|i| format!(" in chunk {i}")).unwrap_or_default()
}

pub type WriteResult<T> = Result<T, WriteError>;
pub type ReadResult<T> = Result<T, ReadError>;
pub type DeleteResult<T> = Result<T, DeleteError>;
