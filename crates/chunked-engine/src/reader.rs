use std::ops::Range;
use std::time::Duration;

use bytes::Bytes;
use chunked_store::ChunkedStorageProvider;
use chunked_types::ObjectMetadata;
use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ReaderConfig;
use crate::error::{ReadError, ReadResult};
use crate::info::load_metadata;

/// Reassembles an object from its chunks into an output sink.
///
/// Chunks are fetched in batches of `batch_size` consecutive indices. Within
/// a batch at most `concurrency_level` fetches are in flight and they may
/// complete in any order; the batch is written to the output in index order
/// once all of its chunks have arrived. The next batch is not requested
/// until the previous one has been written, which bounds memory use to one
/// batch of chunks.
pub struct ObjectReader<'a, P: ?Sized, W> {
    provider: &'a P,
    object: String,
    output: W,
    config: ReaderConfig,
    cancel: Option<CancellationToken>,
}

impl<'a, P, W> ObjectReader<'a, P, W>
where
    P: ChunkedStorageProvider + ?Sized,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(provider: &'a P, object: impl Into<String>, output: W) -> Self {
        Self {
            provider,
            object: object.into(),
            output,
            config: ReaderConfig::default(),
            cancel: None,
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn with_concurrency_level(mut self, level: usize) -> Self {
        self.config.concurrency_level = level;
        self
    }

    /// Deadline for the whole read; `None` waits indefinitely.
    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.config.max_wait = max_wait;
        self
    }

    pub fn with_randomized_order(mut self, randomize: bool) -> Self {
        self.config.randomize_order = randomize;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Run the read. Returns the metadata of the object that was read.
    pub async fn call(self) -> ReadResult<ObjectMetadata> {
        let object = self.object.clone();
        self.config.validate()?;

        let result = match self.config.max_wait {
            Some(limit) => tokio::time::timeout(limit, self.run())
                .await
                .unwrap_or_else(|_| {
                    Err(ReadError::TimedOut {
                        object: object.clone(),
                        after: limit,
                    })
                }),
            None => self.run().await,
        };
        if let Err(error) = &result {
            warn!(object = %object, error = %error, "read failed");
        }
        result
    }

    async fn run(self) -> ReadResult<ObjectMetadata> {
        let Self {
            provider,
            object,
            mut output,
            config,
            cancel,
        } = self;
        let name = object.as_str();

        if cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(ReadError::Cancelled { object });
        }
        let metadata = load_metadata(provider, name).await?;

        let mut written: u64 = 0;
        for batch in batches(metadata.chunk_count, config.batch_size) {
            let fetch = fetch_batch(provider, &metadata, batch.clone(), &config);
            let chunks = match &cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Err(ReadError::Cancelled { object });
                    }
                    chunks = fetch => chunks?,
                },
                None => fetch.await?,
            };

            for chunk in &chunks {
                output
                    .write_all(chunk)
                    .await
                    .map_err(|source| ReadError::Output {
                        object: object.clone(),
                        source,
                    })?;
                written += chunk.len() as u64;
            }
            debug!(object = %name, first = batch.start, last = batch.end - 1, "batch written");
        }

        output.flush().await.map_err(|source| ReadError::Output {
            object: object.clone(),
            source,
        })?;
        if written != metadata.object_size {
            return Err(ReadError::SizeMismatch {
                object,
                index: None,
                expected: metadata.object_size,
                actual: written,
            });
        }

        info!(
            object = %name,
            bytes = written,
            chunk_count = metadata.chunk_count,
            "object read"
        );
        Ok(metadata)
    }
}

/// Consecutive index ranges of at most `batch_size` chunks covering
/// `0..chunk_count`.
fn batches(chunk_count: u32, batch_size: usize) -> impl Iterator<Item = Range<u32>> {
    let step = u32::try_from(batch_size).unwrap_or(u32::MAX);
    (0..chunk_count)
        .step_by(batch_size)
        .map(move |start| start..start.saturating_add(step).min(chunk_count))
}

/// Fetch every chunk of `batch` and return them in index order. Each chunk
/// must be present and exactly as long as the metadata says.
async fn fetch_batch<P>(
    provider: &P,
    metadata: &ObjectMetadata,
    batch: Range<u32>,
    config: &ReaderConfig,
) -> ReadResult<Vec<Bytes>>
where
    P: ChunkedStorageProvider + ?Sized,
{
    let name = metadata.name.as_str();
    let first = batch.start;
    let mut order: Vec<u32> = batch.collect();
    if config.randomize_order {
        order.shuffle(&mut rand::thread_rng());
    }
    let mut slots: Vec<Option<Bytes>> = vec![None; order.len()];

    let mut fetches = stream::iter(order)
        .map(|index| async move { (index, provider.get_chunk(name, index).await) })
        .buffer_unordered(config.concurrency_level);

    while let Some((index, result)) = fetches.next().await {
        let chunk = match result {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                return Err(ReadError::ChunkUnavailable {
                    object: name.to_string(),
                    index,
                    source: None,
                })
            }
            Err(e) => {
                return Err(ReadError::ChunkUnavailable {
                    object: name.to_string(),
                    index,
                    source: Some(e),
                })
            }
        };
        let expected = metadata.chunk_len(index).unwrap_or(0);
        if chunk.len() as u64 != expected {
            return Err(ReadError::SizeMismatch {
                object: name.to_string(),
                index: Some(index),
                expected,
                actual: chunk.len() as u64,
            });
        }
        slots[(index - first) as usize] = Some(chunk);
    }

    Ok(slots.into_iter().flatten().collect())
}
