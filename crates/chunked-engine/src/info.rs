use chunked_store::ChunkedStorageProvider;
use chunked_types::ObjectMetadata;
use tracing::debug;

use crate::error::{ReadError, ReadResult};

/// Loads an object's metadata without touching its chunks.
pub struct ObjectInfoReader<'a, P: ?Sized> {
    provider: &'a P,
    object: String,
}

impl<'a, P> ObjectInfoReader<'a, P>
where
    P: ChunkedStorageProvider + ?Sized,
{
    pub fn new(provider: &'a P, object: impl Into<String>) -> Self {
        Self {
            provider,
            object: object.into(),
        }
    }

    pub async fn call(self) -> ReadResult<ObjectMetadata> {
        load_metadata(self.provider, &self.object).await
    }
}

/// Fetch and validate the metadata of `object`.
pub(crate) async fn load_metadata<P>(provider: &P, object: &str) -> ReadResult<ObjectMetadata>
where
    P: ChunkedStorageProvider + ?Sized,
{
    let metadata = provider
        .get_metadata(object)
        .await
        .map_err(|source| ReadError::Metadata {
            object: object.to_string(),
            source,
        })?
        .ok_or_else(|| ReadError::NotFound(object.to_string()))?;
    metadata.validate()?;
    debug!(
        object = %object,
        object_size = metadata.object_size,
        chunk_count = metadata.chunk_count,
        "metadata loaded"
    );
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::ObjectWriter;

    #[tokio::test]
    async fn reads_committed_metadata() {
        let provider = memory_provider();
        let written = ObjectWriter::new(&provider, "MyObject", alphabet(100).as_slice())
            .with_chunk_size(100)
            .call()
            .await
            .unwrap();

        let info = ObjectInfoReader::new(&provider, "MyObject")
            .call()
            .await
            .unwrap();
        assert_eq!(info, written);
        assert_eq!(info.object_size, 2700);
        assert_eq!(info.chunk_count, 27);
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let provider = memory_provider();
        let err = ObjectInfoReader::new(&provider, "ghost")
            .call()
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn inconsistent_metadata_is_rejected() {
        let provider = memory_provider();
        provider
            .put_metadata("bad", &ObjectMetadata::new("bad", 2700, 100, 5))
            .await
            .unwrap();
        let err = ObjectInfoReader::new(&provider, "bad")
            .call()
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::InvalidMetadata(_)));
    }

    #[tokio::test]
    async fn works_through_trait_object() {
        let provider = memory_provider();
        provider
            .put_metadata("obj", &ObjectMetadata::new("obj", 0, 10, 0))
            .await
            .unwrap();
        let dynamic: &dyn ChunkedStorageProvider = &provider;
        let info = ObjectInfoReader::new(dynamic, "obj").call().await.unwrap();
        assert_eq!(info.chunk_count, 0);
    }
}
