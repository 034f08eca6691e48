use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::key::chunk_key;

/// Number of chunks needed to hold `object_size` bytes at `chunk_size` bytes
/// per chunk. Zero bytes need zero chunks.
///
/// `chunk_size` must be non-zero.
pub fn expected_chunk_count(object_size: u64, chunk_size: u32) -> u64 {
    debug_assert!(chunk_size > 0, "chunk size must be positive");
    object_size.div_ceil(u64::from(chunk_size))
}

/// Commit record describing a stored object.
///
/// The metadata is written last by a successful write, so its presence in
/// the backend is the visibility signal for the object: a reader observing it
/// may assume every one of the `chunk_count` chunk records exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Unique name of the logical object.
    pub name: String,
    /// Total number of bytes written.
    pub object_size: u64,
    /// Maximum number of bytes per chunk used by the write.
    pub chunk_size: u32,
    /// Number of chunk records persisted.
    pub chunk_count: u32,
    /// Expiry applied to every record of the write, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,
    /// Opaque caller-supplied attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<String>,
}

impl ObjectMetadata {
    pub fn new(
        name: impl Into<String>,
        object_size: u64,
        chunk_size: u32,
        chunk_count: u32,
    ) -> Self {
        Self {
            name: name.into(),
            object_size,
            chunk_size,
            chunk_count,
            ttl: None,
            attributes: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_attributes(mut self, attributes: Option<String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Returns `true` when the layout is self-consistent: a positive chunk
    /// size and a chunk count matching the object size.
    pub fn is_valid_for_read(&self) -> bool {
        self.validate().is_ok()
    }

    /// Check the layout invariants, describing the first violation found.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.chunk_size == 0 {
            return Err(self.invalid("chunk size is zero".into()));
        }
        let expected = expected_chunk_count(self.object_size, self.chunk_size);
        if u64::from(self.chunk_count) != expected {
            return Err(self.invalid(format!(
                "chunk count {} does not cover {} bytes at {} bytes per chunk (expected {expected})",
                self.chunk_count, self.object_size, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Expected byte length of chunk `index`. The last chunk may be short.
    pub fn chunk_len(&self, index: u32) -> Option<u64> {
        if index >= self.chunk_count {
            return None;
        }
        let start = u64::from(index) * u64::from(self.chunk_size);
        Some(self.object_size.saturating_sub(start).min(u64::from(self.chunk_size)))
    }

    /// Record keys of every chunk of this object, in index order.
    pub fn chunk_keys(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.chunk_count).map(|index| chunk_key(&self.name, index))
    }

    fn invalid(&self, reason: String) -> TypeError {
        TypeError::InvalidMetadata {
            name: self.name.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_count_rounds_up() {
        assert_eq!(expected_chunk_count(2700, 100), 27);
        assert_eq!(expected_chunk_count(2701, 100), 28);
        assert_eq!(expected_chunk_count(1, 100), 1);
        assert_eq!(expected_chunk_count(100, 100), 1);
    }

    #[test]
    fn empty_object_has_no_chunks() {
        assert_eq!(expected_chunk_count(0, 100), 0);
        assert!(ObjectMetadata::new("empty", 0, 100, 0).is_valid_for_read());
    }

    #[test]
    fn valid_layout() {
        let meta = ObjectMetadata::new("MyObject", 2700, 100, 27);
        assert!(meta.is_valid_for_read());
    }

    #[test]
    fn zero_chunk_size_is_invalid() {
        let meta = ObjectMetadata::new("bad", 10, 0, 1);
        assert!(!meta.is_valid_for_read());
        assert!(matches!(
            meta.validate(),
            Err(TypeError::InvalidMetadata { .. })
        ));
    }

    #[test]
    fn mismatched_chunk_count_is_invalid() {
        let meta = ObjectMetadata::new("bad", 2700, 100, 26);
        let err = meta.validate().unwrap_err();
        assert!(err.to_string().contains("expected 27"));
    }

    #[test]
    fn chunk_len_handles_short_tail() {
        let meta = ObjectMetadata::new("tail", 250, 100, 3);
        assert_eq!(meta.chunk_len(0), Some(100));
        assert_eq!(meta.chunk_len(1), Some(100));
        assert_eq!(meta.chunk_len(2), Some(50));
        assert_eq!(meta.chunk_len(3), None);
    }

    #[test]
    fn chunk_keys_in_order() {
        let meta = ObjectMetadata::new("obj", 25, 10, 3);
        let keys: Vec<String> = meta.chunk_keys().collect();
        assert_eq!(keys, vec!["obj$0", "obj$1", "obj$2"]);
    }

    #[test]
    fn serde_roundtrip_omits_empty_optionals() {
        let meta = ObjectMetadata::new("obj", 25, 10, 3);
        let json = serde_json::to_string(&meta).unwrap();
        assert!(!json.contains("ttl"));
        assert!(!json.contains("attributes"));
        let parsed: ObjectMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn serde_roundtrip_with_optionals() {
        let meta = ObjectMetadata::new("obj", 25, 10, 3)
            .with_ttl(Some(Duration::from_secs(30)))
            .with_attributes(Some("content-type=text/plain".into()));
        let json = serde_json::to_string(&meta).unwrap();
        let parsed: ObjectMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, meta);
    }

    proptest::proptest! {
        #[test]
        fn expected_count_covers_every_byte(size in 0u64..1_000_000, chunk in 1u32..10_000) {
            let count = expected_chunk_count(size, chunk);
            proptest::prop_assert!(count * u64::from(chunk) >= size);
            if size > 0 {
                proptest::prop_assert!((count - 1) * u64::from(chunk) < size);
            } else {
                proptest::prop_assert_eq!(count, 0);
            }
        }
    }
}
