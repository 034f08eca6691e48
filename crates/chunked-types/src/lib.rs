//! Foundation types for chunked object storage.
//!
//! An *object* is an arbitrary-length byte stream stored as a sequence of
//! fixed-size *chunks*, each an independent backend record, plus one
//! *metadata* record describing the layout. Every other crate in the
//! workspace depends on `chunked-types`.
//!
//! # Key Types
//!
//! - [`ObjectMetadata`] -- the commit record: size, chunk size, chunk count
//! - [`ChunkKey`] -- `(object, index)` address, rendered as `"<object>$<index>"`

pub mod error;
pub mod key;
pub mod object;

pub use error::TypeError;
pub use key::{chunk_key, ChunkKey, CHUNK_KEY_SEPARATOR};
pub use object::{expected_chunk_count, ObjectMetadata};
