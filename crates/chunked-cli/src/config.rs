//! Optional TOML configuration for the `chunked` tool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chunked_engine::{ReaderConfig, WriterConfig};
use serde::{Deserialize, Serialize};

/// Store directory used when neither `--root` nor the config file names one.
pub const DEFAULT_ROOT: &str = ".chunked";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub root: Option<PathBuf>,
    pub writer: WriterSection,
    pub reader: ReaderSection,
}

/// `[writer]` table. Durations are whole seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterSection {
    pub chunk_size: Option<u32>,
    pub concurrency: Option<usize>,
    pub ttl_secs: Option<u64>,
    /// 0 disables the deadline.
    pub max_wait_secs: Option<u64>,
    pub attributes: Option<String>,
}

/// `[reader]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSection {
    pub batch_size: Option<usize>,
    pub concurrency: Option<usize>,
    /// 0 disables the deadline.
    pub max_wait_secs: Option<u64>,
    pub randomize_order: bool,
}

impl CliConfig {
    /// Load `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: CliConfig = toml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// `--root` wins over the config file.
    pub fn root(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.root.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT))
    }

    pub fn writer_config(&self) -> WriterConfig {
        let mut config = WriterConfig::default();
        let section = &self.writer;
        config.chunk_size = section.chunk_size.or(config.chunk_size);
        if let Some(level) = section.concurrency {
            config.concurrency_level = level;
        }
        config.ttl = section.ttl_secs.map(Duration::from_secs);
        if let Some(secs) = section.max_wait_secs {
            config.max_wait = deadline(secs);
        }
        config.attributes = section.attributes.clone();
        config
    }

    pub fn reader_config(&self) -> ReaderConfig {
        let mut config = ReaderConfig::default();
        let section = &self.reader;
        if let Some(size) = section.batch_size {
            config.batch_size = size;
        }
        if let Some(level) = section.concurrency {
            config.concurrency_level = level;
        }
        if let Some(secs) = section.max_wait_secs {
            config.max_wait = deadline(secs);
        }
        config.randomize_order = section.randomize_order;
        config
    }
}

fn deadline(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
