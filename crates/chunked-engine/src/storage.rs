use chunked_store::ChunkedStorageProvider;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::{ReaderConfig, WriterConfig};
use crate::deleter::ObjectDeleter;
use crate::info::ObjectInfoReader;
use crate::reader::ObjectReader;
use crate::writer::ObjectWriter;

/// Entry point bundling a provider with default writer and reader settings.
///
/// Each `new_*` constructor returns the corresponding builder, already
/// carrying the defaults; per-call `with_*` overrides still apply.
#[derive(Debug)]
pub struct ChunkedStorage<P> {
    provider: P,
    writer_config: WriterConfig,
    reader_config: ReaderConfig,
}

impl<P: ChunkedStorageProvider> ChunkedStorage<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            writer_config: WriterConfig::default(),
            reader_config: ReaderConfig::default(),
        }
    }

    pub fn with_writer_config(mut self, config: WriterConfig) -> Self {
        self.writer_config = config;
        self
    }

    pub fn with_reader_config(mut self, config: ReaderConfig) -> Self {
        self.reader_config = config;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn writer_config(&self) -> &WriterConfig {
        &self.writer_config
    }

    pub fn reader_config(&self) -> &ReaderConfig {
        &self.reader_config
    }

    pub fn into_inner(self) -> P {
        self.provider
    }

    pub fn new_writer<R>(&self, object: impl Into<String>, input: R) -> ObjectWriter<'_, P, R>
    where
        R: AsyncRead + Unpin + Send,
    {
        ObjectWriter::new(&self.provider, object, input).with_config(self.writer_config.clone())
    }

    pub fn new_reader<W>(&self, object: impl Into<String>, output: W) -> ObjectReader<'_, P, W>
    where
        W: AsyncWrite + Unpin + Send,
    {
        ObjectReader::new(&self.provider, object, output).with_config(self.reader_config.clone())
    }

    pub fn new_info_reader(&self, object: impl Into<String>) -> ObjectInfoReader<'_, P> {
        ObjectInfoReader::new(&self.provider, object)
    }

    pub fn new_deleter(&self, object: impl Into<String>) -> ObjectDeleter<'_, P> {
        ObjectDeleter::new(&self.provider, object)
            .with_concurrency_level(self.writer_config.concurrency_level)
    }
}
