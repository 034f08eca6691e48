use std::time::Duration;

use bytes::Bytes;
use chunked_store::ChunkedStorageProvider;
use chunked_types::ObjectMetadata;
use futures::stream::{FuturesOrdered, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::callback::{WriteCallback, NOOP_CALLBACK};
use crate::config::WriterConfig;
use crate::error::{ChunkFault, WriteError, WriteResult};

/// Splits an input stream into chunks, persists them, then commits the
/// object's metadata.
///
/// The metadata is written only after every chunk write has succeeded, so a
/// failed write never leaves a visible object. Chunks written before a
/// failure are left in place; a later write to the same name overwrites them
/// from index 0.
///
/// Chunk indices are assigned and issued in increasing order. With a
/// concurrency level above one, up to that many chunk writes are in flight
/// while the next chunk is read from the input.
pub struct ObjectWriter<'a, P: ?Sized, R> {
    provider: &'a P,
    object: String,
    input: R,
    callback: &'a dyn WriteCallback,
    config: WriterConfig,
    cancel: Option<CancellationToken>,
}

impl<'a, P, R> ObjectWriter<'a, P, R>
where
    P: ChunkedStorageProvider + ?Sized,
    R: AsyncRead + Unpin + Send,
{
    pub fn new(provider: &'a P, object: impl Into<String>, input: R) -> Self {
        Self {
            provider,
            object: object.into(),
            input,
            callback: &NOOP_CALLBACK,
            config: WriterConfig::default(),
            cancel: None,
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.config.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_concurrency_level(mut self, level: usize) -> Self {
        self.config.concurrency_level = level;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = Some(ttl);
        self
    }

    pub fn with_attributes(mut self, attributes: impl Into<String>) -> Self {
        self.config.attributes = Some(attributes.into());
        self
    }

    /// Deadline for the whole write; `None` waits indefinitely.
    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.config.max_wait = max_wait;
        self
    }

    pub fn with_callback(mut self, callback: &'a dyn WriteCallback) -> Self {
        self.callback = callback;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Run the write. Returns the committed metadata.
    pub async fn call(self) -> WriteResult<ObjectMetadata> {
        let callback = self.callback;
        let object = self.object.clone();

        let result = match self.config.validate() {
            Err(e) => Err(e),
            Ok(()) => match self.config.max_wait {
                Some(limit) => tokio::time::timeout(limit, self.run())
                    .await
                    .unwrap_or_else(|_| {
                        Err(WriteError::TimedOut {
                            object: object.clone(),
                            after: limit,
                        })
                    }),
                None => self.run().await,
            },
        };

        match result {
            Ok(metadata) => {
                callback.on_success();
                Ok(metadata)
            }
            Err(error) => {
                warn!(object = %object, error = %error, "write failed");
                if !error.is_chunk_fault() {
                    callback.on_failure(&error);
                }
                Err(error)
            }
        }
    }

    async fn run(self) -> WriteResult<ObjectMetadata> {
        let Self {
            provider,
            object,
            mut input,
            callback,
            config,
            cancel,
        } = self;
        let chunk_size = config
            .chunk_size
            .unwrap_or_else(|| provider.default_chunk_size());
        if chunk_size == 0 {
            return Err(WriteError::InvalidConfig(
                "provider default chunk size is 0".into(),
            ));
        }
        let ttl = config.ttl;
        let name = object.as_str();
        debug!(object = %name, chunk_size, concurrency = config.concurrency_level, "write started");

        let token = cancel.as_ref();
        let mut in_flight = FuturesOrdered::new();
        let mut failure: Option<WriteError> = None;
        let mut index: u32 = 0;
        let mut total: u64 = 0;

        // Issued puts keep running while the next chunk is read; the loop
        // only blocks on them when the window is full.
        'chunks: loop {
            if token.is_some_and(|t| t.is_cancelled()) {
                failure = Some(cancelled_error(name));
                break;
            }

            while in_flight.len() >= config.concurrency_level {
                tokio::select! {
                    biased;
                    _ = cancelled(token) => {
                        failure = Some(cancelled_error(name));
                        break 'chunks;
                    }
                    Some((done, result)) = in_flight.next() => {
                        settle(callback, name, done, result, &mut failure);
                    }
                }
                if failure.is_some() {
                    break 'chunks;
                }
            }

            let read = read_chunk(&mut input, chunk_size);
            tokio::pin!(read);
            let chunk = loop {
                tokio::select! {
                    biased;
                    _ = cancelled(token) => {
                        failure = Some(cancelled_error(name));
                        break 'chunks;
                    }
                    Some((done, result)) = in_flight.next(), if !in_flight.is_empty() => {
                        settle(callback, name, done, result, &mut failure);
                        if failure.is_some() {
                            break 'chunks;
                        }
                    }
                    chunk = &mut read => break chunk,
                }
            };
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(source) => {
                    failure = Some(WriteError::Input {
                        object: object.clone(),
                        index,
                        source,
                    });
                    break;
                }
            };
            if chunk.is_empty() {
                break;
            }

            let size = chunk.len();
            if let Err(e) = callback.on_chunk(index, size) {
                let fault = ChunkFault::Callback(e);
                callback.on_chunk_exception(index, &fault);
                failure = Some(WriteError::Chunk {
                    object: object.clone(),
                    index,
                    source: fault,
                });
                break;
            }

            let current = index;
            in_flight.push_back(async move {
                (current, provider.put_chunk(name, current, chunk, ttl).await)
            });
            total += size as u64;
            index = match index.checked_add(1) {
                Some(next) => next,
                None => {
                    failure = Some(WriteError::TooManyChunks {
                        object: object.clone(),
                    });
                    break;
                }
            };
        }

        // Writes already issued are allowed to finish and every failed one
        // is reported. Cancellation abandons them.
        while !in_flight.is_empty() {
            tokio::select! {
                biased;
                _ = cancelled(token) => {
                    failure.get_or_insert_with(|| cancelled_error(name));
                    break;
                }
                Some((done, result)) = in_flight.next() => {
                    settle(callback, name, done, result, &mut failure);
                }
            }
        }
        if let Some(error) = failure {
            return Err(error);
        }
        if token.is_some_and(|t| t.is_cancelled()) {
            return Err(cancelled_error(name));
        }

        let metadata = ObjectMetadata::new(object.clone(), total, chunk_size, index)
            .with_ttl(ttl)
            .with_attributes(config.attributes);
        provider
            .put_metadata(name, &metadata)
            .await
            .map_err(|source| WriteError::Metadata {
                object: object.clone(),
                source,
            })?;

        info!(
            object = %name,
            bytes = total,
            chunk_count = index,
            chunk_size,
            "object committed"
        );
        Ok(metadata)
    }
}

/// Resolves once `token` is cancelled. Without a token it never resolves.
async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

fn cancelled_error(object: &str) -> WriteError {
    WriteError::Cancelled {
        object: object.to_string(),
    }
}

/// Record the outcome of one chunk write. A failure is reported to the
/// callback and kept as the write's error if it has the lowest failing index
/// seen so far.
fn settle(
    callback: &dyn WriteCallback,
    object: &str,
    index: u32,
    result: chunked_store::StoreResult<()>,
    failure: &mut Option<WriteError>,
) {
    let Err(e) = result else {
        return;
    };
    warn!(object = %object, index, error = %e, "chunk write failed");
    let fault = ChunkFault::Store(e);
    callback.on_chunk_exception(index, &fault);
    let replace = match failure {
        None => true,
        Some(WriteError::Chunk { index: earlier, .. }) => index < *earlier,
        Some(_) => false,
    };
    if replace {
        *failure = Some(WriteError::Chunk {
            object: object.to_string(),
            index,
            source: fault,
        });
    }
}

/// Read up to `chunk_size` bytes, retrying short reads until the chunk is
/// full or the input ends.
async fn read_chunk<R>(input: &mut R, chunk_size: u32) -> std::io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(chunk_size as usize);
    input
        .take(u64::from(chunk_size))
        .read_to_end(&mut buf)
        .await?;
    Ok(Bytes::from(buf))
}
