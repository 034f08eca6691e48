//! Storage backends for chunked objects.
//!
//! The chunked storage engine never talks to a database directly. It
//! consumes the narrow [`ChunkedStorageProvider`] capability: get, put and
//! delete of one record per chunk and one metadata record per object.
//!
//! # Backends
//!
//! [`RecordChunkedStorageProvider`] implements the capability on top of any
//! column-oriented [`RecordStore`]:
//!
//! - [`InMemoryRecordStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsRecordStore`] -- one file per row under a local directory
//!
//! # Design Rules
//!
//! 1. A missing record is `Ok(None)`; deleting a missing record succeeds.
//! 2. No transaction spans two calls. Ordering guarantees belong to the engine.
//! 3. Expired records are indistinguishable from absent ones.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod provider;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use fs::FsRecordStore;
pub use memory::InMemoryRecordStore;
pub use provider::{ColumnNames, RecordChunkedStorageProvider};
pub use traits::{ChunkedStorageProvider, RecordStore, Row, DEFAULT_CHUNK_SIZE};

/// Provider over an [`InMemoryRecordStore`].
pub type InMemoryChunkedStorageProvider = RecordChunkedStorageProvider<InMemoryRecordStore>;

/// Provider over an [`FsRecordStore`].
pub type FsChunkedStorageProvider = RecordChunkedStorageProvider<FsRecordStore>;
