//! Test doubles shared by the engine's unit tests.

use std::collections::HashSet;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chunked_store::{
    ChunkedStorageProvider, InMemoryChunkedStorageProvider, InMemoryRecordStore,
    RecordChunkedStorageProvider, StoreError, StoreResult,
};
use chunked_types::ObjectMetadata;
use rand::Rng;
use tokio::io::{AsyncRead, ReadBuf};

use crate::callback::WriteCallback;
use crate::error::{CallbackError, ChunkFault, WriteError};

pub(crate) const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz_";

/// `"abcdefghijklmnopqrstuvwxyz_"` repeated `repeats` times.
pub(crate) fn alphabet(repeats: usize) -> Vec<u8> {
    ALPHABET.repeat(repeats)
}

pub(crate) fn memory_provider() -> InMemoryChunkedStorageProvider {
    RecordChunkedStorageProvider::new(InMemoryRecordStore::new())
}

// ---------------------------------------------------------------------------
// Callback
// ---------------------------------------------------------------------------

/// Records every callback event; optionally faults on one chunk.
#[derive(Default)]
pub(crate) struct RecordingCallback {
    fail_on: Option<u32>,
    pub chunks: Mutex<Vec<(u32, usize)>>,
    pub chunk_exceptions: Mutex<Vec<u32>>,
    pub successes: AtomicUsize,
    pub failures: AtomicUsize,
}

impl RecordingCallback {
    pub fn failing_on(index: u32) -> Self {
        Self {
            fail_on: Some(index),
            ..Default::default()
        }
    }

    pub fn chunk_indices(&self) -> Vec<u32> {
        self.chunks.lock().unwrap().iter().map(|(i, _)| *i).collect()
    }

    pub fn exceptions(&self) -> Vec<u32> {
        self.chunk_exceptions.lock().unwrap().clone()
    }

    pub fn success_count(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

impl WriteCallback for RecordingCallback {
    fn on_chunk(&self, index: u32, size: usize) -> Result<(), CallbackError> {
        self.chunks.lock().unwrap().push((index, size));
        if self.fail_on == Some(index) {
            return Err(format!("failing for chunk: {index}").into());
        }
        Ok(())
    }

    fn on_chunk_exception(&self, index: u32, _fault: &ChunkFault) {
        self.chunk_exceptions.lock().unwrap().push(index);
    }

    fn on_success(&self) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failure(&self, _error: &WriteError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// In-memory provider with injectable faults, random fetch latency and
/// instrumentation of the calls it receives.
pub(crate) struct FaultyProvider {
    inner: InMemoryChunkedStorageProvider,
    fail_put_chunk: HashSet<u32>,
    fail_get_chunk: HashSet<u32>,
    fail_delete_chunk: HashSet<u32>,
    fail_put_metadata: bool,
    fail_delete_metadata: bool,
    max_jitter: Option<Duration>,
    put_delay: Option<Duration>,
    puts: Mutex<Vec<u32>>,
    gets_completed: Mutex<Vec<u32>>,
    deletes: Mutex<Vec<u32>>,
    in_flight_gets: AtomicUsize,
    peak_gets: AtomicUsize,
}

impl FaultyProvider {
    pub fn new() -> Self {
        Self {
            inner: memory_provider(),
            fail_put_chunk: HashSet::new(),
            fail_get_chunk: HashSet::new(),
            fail_delete_chunk: HashSet::new(),
            fail_put_metadata: false,
            fail_delete_metadata: false,
            max_jitter: None,
            put_delay: None,
            puts: Mutex::new(Vec::new()),
            gets_completed: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            in_flight_gets: AtomicUsize::new(0),
            peak_gets: AtomicUsize::new(0),
        }
    }

    pub fn failing_put_chunk(mut self, index: u32) -> Self {
        self.fail_put_chunk.insert(index);
        self
    }

    pub fn failing_get_chunk(mut self, index: u32) -> Self {
        self.fail_get_chunk.insert(index);
        self
    }

    pub fn failing_delete_chunk(mut self, index: u32) -> Self {
        self.fail_delete_chunk.insert(index);
        self
    }

    pub fn failing_put_metadata(mut self) -> Self {
        self.fail_put_metadata = true;
        self
    }

    pub fn failing_delete_metadata(mut self) -> Self {
        self.fail_delete_metadata = true;
        self
    }

    /// Delay every chunk fetch by a random duration up to `max`.
    pub fn with_jitter(mut self, max: Duration) -> Self {
        self.max_jitter = Some(max);
        self
    }

    /// Delay every chunk write by `delay`.
    pub fn with_put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = Some(delay);
        self
    }

    pub fn inner(&self) -> &InMemoryChunkedStorageProvider {
        &self.inner
    }

    pub fn puts(&self) -> Vec<u32> {
        self.puts.lock().unwrap().clone()
    }

    pub fn gets_completed(&self) -> Vec<u32> {
        self.gets_completed.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<u32> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn peak_concurrent_gets(&self) -> usize {
        self.peak_gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkedStorageProvider for FaultyProvider {
    async fn get_chunk(&self, object: &str, index: u32) -> StoreResult<Option<Bytes>> {
        let now = self.in_flight_gets.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_gets.fetch_max(now, Ordering::SeqCst);

        if let Some(max) = self.max_jitter {
            let micros = rand::thread_rng().gen_range(0..=max.as_micros() as u64);
            tokio::time::sleep(Duration::from_micros(micros)).await;
        } else {
            tokio::task::yield_now().await;
        }

        let result = if self.fail_get_chunk.contains(&index) {
            Err(StoreError::Unavailable(format!("injected read fault on chunk {index}")))
        } else {
            self.inner.get_chunk(object, index).await
        };
        self.in_flight_gets.fetch_sub(1, Ordering::SeqCst);
        self.gets_completed.lock().unwrap().push(index);
        result
    }

    async fn put_chunk(
        &self,
        object: &str,
        index: u32,
        data: Bytes,
        ttl: Option<Duration>,
    ) -> StoreResult<()> {
        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_put_chunk.contains(&index) {
            return Err(StoreError::Backend(format!("injected write fault on chunk {index}")));
        }
        self.inner.put_chunk(object, index, data, ttl).await?;
        self.puts.lock().unwrap().push(index);
        Ok(())
    }

    async fn delete_chunk(&self, object: &str, index: u32) -> StoreResult<()> {
        if self.fail_delete_chunk.contains(&index) {
            return Err(StoreError::Backend(format!("injected delete fault on chunk {index}")));
        }
        self.inner.delete_chunk(object, index).await?;
        self.deletes.lock().unwrap().push(index);
        Ok(())
    }

    async fn get_metadata(&self, object: &str) -> StoreResult<Option<ObjectMetadata>> {
        self.inner.get_metadata(object).await
    }

    async fn put_metadata(&self, object: &str, metadata: &ObjectMetadata) -> StoreResult<()> {
        if self.fail_put_metadata {
            return Err(StoreError::Unavailable("injected metadata write fault".into()));
        }
        self.inner.put_metadata(object, metadata).await
    }

    async fn delete_metadata(&self, object: &str) -> StoreResult<()> {
        if self.fail_delete_metadata {
            return Err(StoreError::Unavailable("injected metadata delete fault".into()));
        }
        self.inner.delete_metadata(object).await
    }

    fn default_chunk_size(&self) -> u32 {
        self.inner.default_chunk_size()
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Input that hands out at most `step` bytes per read. Once `fail_at` bytes
/// are consumed it fails; once `stall_at` bytes are consumed it never
/// becomes ready again.
pub(crate) struct TrickleInput {
    data: Vec<u8>,
    pos: usize,
    step: usize,
    fail_at: Option<usize>,
    stall_at: Option<usize>,
}

impl TrickleInput {
    pub fn new(data: Vec<u8>, step: usize) -> Self {
        Self {
            data,
            pos: 0,
            step,
            fail_at: None,
            stall_at: None,
        }
    }

    pub fn failing_at(mut self, offset: usize) -> Self {
        self.fail_at = Some(offset);
        self
    }

    pub fn stalling_at(mut self, offset: usize) -> Self {
        self.stall_at = Some(offset);
        self
    }
}

impl AsyncRead for TrickleInput {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(fail_at) = self.fail_at {
            if self.pos >= fail_at {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "input broke")));
            }
        }
        if self.stall_at.is_some_and(|stall_at| self.pos >= stall_at) {
            return Poll::Pending;
        }
        let mut end = (self.pos + self.step).min(self.data.len());
        for limit in [self.fail_at, self.stall_at].into_iter().flatten() {
            end = end.min(limit.max(self.pos));
        }
        let n = (end - self.pos).min(buf.remaining());
        let start = self.pos;
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

/// Input that never produces data.
pub(crate) struct StalledInput;

impl AsyncRead for StalledInput {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}
