use crate::error::{CallbackError, ChunkFault, WriteError};

/// Observer of a write in progress.
///
/// Every hook runs synchronously on the writer's task, in this order for a
/// given chunk: `on_chunk` happens before the chunk is persisted, and
/// `on_chunk_exception` after its failure is observed.
///
/// Policy for `on_failure`: it fires exactly once when the write fails for a
/// reason other than a chunk-level fault (input error, metadata commit error,
/// timeout, cancellation, invalid configuration). Chunk-level faults are
/// reported only through `on_chunk_exception`.
pub trait WriteCallback: Send + Sync {
    /// Called immediately before chunk `index` of `size` bytes is persisted.
    /// Returning an error aborts the chunk and the write.
    fn on_chunk(&self, index: u32, size: usize) -> Result<(), CallbackError> {
        let _ = (index, size);
        Ok(())
    }

    /// Called exactly once for each chunk that failed.
    fn on_chunk_exception(&self, index: u32, fault: &ChunkFault) {
        let _ = (index, fault);
    }

    /// Called once, after the metadata commit, iff the write succeeded.
    fn on_success(&self) {}

    /// Called at most once, for failures outside the chunk loop.
    fn on_failure(&self, error: &WriteError) {
        let _ = error;
    }
}

/// Callback that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopWriteCallback;

impl WriteCallback for NoopWriteCallback {}

pub(crate) static NOOP_CALLBACK: NoopWriteCallback = NoopWriteCallback;
