use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{RecordStore, Row};

const ROW_EXTENSION: &str = "row";

/// A column as persisted on disk.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredCell {
    value: Vec<u8>,
    /// Absolute expiry in milliseconds since the unix epoch.
    expires_at_ms: Option<u64>,
}

impl StoredCell {
    fn is_live(&self, now_ms: u64) -> bool {
        self.expires_at_ms.map_or(true, |at| now_ms < at)
    }
}

/// A row file: the full row key plus its cells.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRow {
    key: String,
    cells: BTreeMap<String, StoredCell>,
}

/// Record store backed by a local directory.
///
/// Each row is one file named after the BLAKE3 digest of the row key, so
/// file names stay short whatever the key length. The file holds the key
/// itself and a bincode map of column name to cell. Writes go to a temporary sibling file
/// that is then renamed over the row file, so readers see either the old row
/// or the new one. Writers within one process are serialized; separate
/// processes writing the same row are last-writer-wins.
pub struct FsRecordStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsRecordStore {
    /// Open (or create) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "opened filesystem record store");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the row files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted keys of all rows present on disk, expired or not.
    pub async fn row_keys(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ROW_EXTENSION) {
                continue;
            }
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                // Removed since the directory listing.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match bincode::deserialize::<StoredRow>(&bytes) {
                Ok(stored) => keys.push(stored.key),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable row file"),
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn row_path(&self, row: &str) -> PathBuf {
        let digest = blake3::hash(row.as_bytes());
        self.root
            .join(format!("{}.{ROW_EXTENSION}", digest.to_hex()))
    }

    async fn load(&self, row: &str) -> StoreResult<Option<BTreeMap<String, StoredCell>>> {
        let path = self.row_path(row);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredRow =
            bincode::deserialize(&bytes).map_err(|e| StoreError::CorruptRecord {
                row: row.to_string(),
                reason: e.to_string(),
            })?;
        if stored.key != row {
            return Err(StoreError::CorruptRecord {
                row: row.to_string(),
                reason: format!("row file holds key {:?}", stored.key),
            });
        }
        Ok(Some(stored.cells))
    }

    async fn store(&self, row: &str, cells: BTreeMap<String, StoredCell>) -> StoreResult<()> {
        let path = self.row_path(row);
        let stored = StoredRow {
            key: row.to_string(),
            cells,
        };
        let bytes =
            bincode::serialize(&stored).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let tmp = path.with_extension(format!("tmp-{:016x}", rand::random::<u64>()));
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FsRecordStore {
    async fn get_row(&self, row: &str) -> StoreResult<Option<Row>> {
        let now = now_ms();
        let Some(cells) = self.load(row).await? else {
            return Ok(None);
        };
        let live: Row = cells
            .into_iter()
            .filter(|(_, c)| c.is_live(now))
            .map(|(name, c)| (name, Bytes::from(c.value)))
            .collect();
        Ok(if live.is_empty() { None } else { Some(live) })
    }

    async fn put_row(&self, row: &str, columns: Row, ttl: Option<Duration>) -> StoreResult<()> {
        let now = now_ms();
        let expires_at_ms = ttl.map(|ttl| now.saturating_add(millis(ttl)));

        let _guard = self.write_lock.lock().await;
        let mut cells = self.load(row).await?.unwrap_or_default();
        cells.retain(|_, c| c.is_live(now));
        for (name, value) in columns {
            cells.insert(
                name,
                StoredCell {
                    value: value.to_vec(),
                    expires_at_ms,
                },
            );
        }
        self.store(row, cells).await
    }

    async fn delete_row(&self, row: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.row_path(row)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_columns(&self, row: &str, columns: &[&str]) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let Some(mut cells) = self.load(row).await? else {
            return Ok(());
        };
        let before = cells.len();
        for column in columns {
            cells.remove(*column);
        }
        if cells.is_empty() {
            match tokio::fs::remove_file(self.row_path(row)).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        } else if cells.len() == before {
            Ok(())
        } else {
            self.store(row, cells).await
        }
    }
}

impl std::fmt::Debug for FsRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsRecordStore")
            .field("root", &self.root)
            .finish()
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(millis)
        .unwrap_or(0)
}
