use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid chunk key {key:?}: {reason}")]
    InvalidChunkKey { key: String, reason: String },

    #[error("invalid metadata for {name}: {reason}")]
    InvalidMetadata { name: String, reason: String },
}
