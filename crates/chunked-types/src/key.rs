use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Separator between the object name and the chunk index in a chunk key.
pub const CHUNK_KEY_SEPARATOR: char = '$';

/// Address of a single chunk record: `(object name, chunk index)`.
///
/// The textual form `"<object>$<index>"` (decimal, zero-based) is what
/// backends use as the record key and what operators see when inspecting a
/// store out of band. It is a compatibility-relevant format.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub object: String,
    pub index: u32,
}

impl ChunkKey {
    pub fn new(object: impl Into<String>, index: u32) -> Self {
        Self {
            object: object.into(),
            index,
        }
    }

    /// Parse a `"<object>$<index>"` key.
    ///
    /// Splits on the last separator, so object names may contain `$`.
    pub fn parse(key: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidChunkKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        let (object, index) = key
            .rsplit_once(CHUNK_KEY_SEPARATOR)
            .ok_or_else(|| invalid("missing '$' separator"))?;
        if object.is_empty() {
            return Err(invalid("empty object name"));
        }
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("index is not a decimal number"));
        }
        let index = index
            .parse::<u32>()
            .map_err(|e| invalid(&e.to_string()))?;
        Ok(Self::new(object, index))
    }

    /// The record key for this chunk.
    pub fn to_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.object, CHUNK_KEY_SEPARATOR, self.index)
    }
}

impl FromStr for ChunkKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Record key of chunk `index` of `object`.
pub fn chunk_key(object: &str, index: u32) -> String {
    format!("{object}{CHUNK_KEY_SEPARATOR}{index}")
}
