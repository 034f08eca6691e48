use chunked_store::ChunkedStorageProvider;
use chunked_types::ObjectMetadata;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{info, warn};

use crate::config::DEFAULT_WRITE_CONCURRENCY;
use crate::error::{DeleteError, DeleteResult};
use crate::info::load_metadata;

/// Removes an object: every chunk first, then the metadata.
///
/// If a chunk delete fails the metadata is left in place, so the object
/// stays visible but later reads fail on the missing chunks. Retrying the
/// delete finishes the job.
pub struct ObjectDeleter<'a, P: ?Sized> {
    provider: &'a P,
    object: String,
    concurrency_level: usize,
}

impl<'a, P> ObjectDeleter<'a, P>
where
    P: ChunkedStorageProvider + ?Sized,
{
    pub fn new(provider: &'a P, object: impl Into<String>) -> Self {
        Self {
            provider,
            object: object.into(),
            concurrency_level: DEFAULT_WRITE_CONCURRENCY,
        }
    }

    /// Maximum number of chunk deletes in flight. Zero is treated as one.
    pub fn with_concurrency_level(mut self, level: usize) -> Self {
        self.concurrency_level = level.max(1);
        self
    }

    /// Run the delete. Returns the metadata of the removed object.
    pub async fn call(self) -> DeleteResult<ObjectMetadata> {
        let result = self.run().await;
        if let Err(error) = &result {
            warn!(error = %error, "delete failed");
        }
        result
    }

    async fn run(&self) -> DeleteResult<ObjectMetadata> {
        let provider = self.provider;
        let name = self.object.as_str();
        let metadata = load_metadata(provider, name).await?;

        stream::iter(0..metadata.chunk_count)
            .map(Ok)
            .try_for_each_concurrent(self.concurrency_level, |index| async move {
                provider
                    .delete_chunk(name, index)
                    .await
                    .map_err(|source| DeleteError::Chunk {
                        object: name.to_string(),
                        index,
                        source,
                    })
            })
            .await?;

        provider
            .delete_metadata(name)
            .await
            .map_err(|source| DeleteError::Metadata {
                object: name.to_string(),
                source,
            })?;

        info!(object = %name, chunk_count = metadata.chunk_count, "object deleted");
        Ok(metadata)
    }
}
