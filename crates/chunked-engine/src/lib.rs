//! Chunked object storage engine.
//!
//! Stores arbitrarily large byte streams in a key/value backend whose
//! records are size-limited, by splitting each stream into fixed-size chunks
//! and committing a metadata record once every chunk is persisted.
//!
//! # Architecture
//!
//! - **ObjectWriter**: chunk the input, persist chunks, commit metadata last
//! - **ObjectReader**: fetch chunks in bounded-concurrency batches and
//!   reassemble them in index order
//! - **ObjectInfoReader**: load metadata only
//! - **ObjectDeleter**: delete chunks, then metadata
//! - **WriteCallback**: observer hooks invoked on the writer's path
//! - **ChunkedStorage**: facade bundling a provider with default settings
//!
//! # Guarantees
//!
//! 1. An object is visible iff its metadata record exists; a failed write
//!    never commits metadata.
//! 2. Reads are byte-exact regardless of fetch completion order.
//! 3. A delete removes the metadata only after every chunk is gone, so an
//!    interrupted delete fails later reads loudly instead of returning
//!    stale bytes.
//! 4. The engine never retries. Every backend error reaches the caller.

pub mod callback;
pub mod config;
pub mod deleter;
pub mod error;
pub mod info;
pub mod reader;
pub mod storage;
pub mod writer;

#[cfg(test)]
mod testing;

pub use callback::{NoopWriteCallback, WriteCallback};
pub use config::{
    ReaderConfig, WriterConfig, DEFAULT_BATCH_SIZE, DEFAULT_READ_CONCURRENCY,
    DEFAULT_WRITE_CONCURRENCY,
};
pub use deleter::ObjectDeleter;
pub use error::{
    CallbackError, ChunkFault, DeleteError, DeleteResult, ReadError, ReadResult, WriteError,
    WriteResult,
};
pub use info::ObjectInfoReader;
pub use reader::ObjectReader;
pub use storage::ChunkedStorage;
pub use writer::ObjectWriter;
