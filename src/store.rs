//! Index persistence.
//!
//! The [`IndexStore`] trait maps a [`DocumentKey`] to at most one
//! [`IndexRecord`]. Two implementations:
//!
//! - [`FileIndexStore`]: one pretty-printed JSON file per key under the
//!   index directory (`<stem>_<hash>.json`). Writes go to a temp file in the
//!   same directory and are renamed into place, so a crash never leaves a
//!   half-written record behind.
//! - [`MemoryIndexStore`]: `HashMap` behind a `RwLock`, for tests and
//!   embedding.
//!
//! A missing or unreadable record loads as `None`; the caller rebuilds.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::hashing::DocumentKey;
use crate::models::IndexRecord;

#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Returns the stored record, or `None` when absent or corrupt.
    async fn load(&self, key: &DocumentKey) -> Result<Option<IndexRecord>>;

    /// Replaces the record for `key`. Failure means nothing was written.
    async fn save(&self, key: &DocumentKey, record: &IndexRecord) -> Result<()>;
}

// ============ File store ============

pub struct FileIndexStore {
    dir: PathBuf,
}

impl FileIndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the record file for `key`.
    pub fn record_path(&self, key: &DocumentKey) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl IndexStore for FileIndexStore {
    async fn load(&self, key: &DocumentKey) -> Result<Option<IndexRecord>> {
        let path = self.record_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable index record, rebuilding");
                return Ok(None);
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt index record, rebuilding");
                Ok(None)
            }
        }
    }

    async fn save(&self, key: &DocumentKey, record: &IndexRecord) -> Result<()> {
        let dir = self.dir.clone();
        let path = self.record_path(key);
        let body = serde_json::to_vec_pretty(record)?;

        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &body)).await?
    }
}

fn write_atomic(dir: &Path, path: &Path, body: &[u8]) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create index directory: {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(body)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write index record: {}", path.display()))?;
    Ok(())
}

// ============ Memory store ============

#[derive(Default)]
pub struct MemoryIndexStore {
    records: RwLock<HashMap<DocumentKey, IndexRecord>>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn load(&self, key: &DocumentKey) -> Result<Option<IndexRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow::anyhow!("index store lock poisoned"))?;
        Ok(records.get(key).cloned())
    }

    async fn save(&self, key: &DocumentKey, record: &IndexRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow::anyhow!("index store lock poisoned"))?;
        records.insert(key.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::derive_key;
    use crate::models::PageRecord;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(hash: &str) -> IndexRecord {
        IndexRecord {
            file_path: "/docs/a.pdf".to_string(),
            content_hash: hash.to_string(),
            total_pages: 2,
            indexed_at: Utc::now(),
            pages: vec![
                PageRecord::summarized(1, "hello".into(), "greeting".into()),
                PageRecord::failed(2, "boom"),
            ],
        }
    }

    #[tokio::test]
    async fn file_store_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = FileIndexStore::new(tmp.path().join("idx"));
        let key = derive_key(Path::new("/docs/a.pdf"));

        assert!(store.load(&key).await.unwrap().is_none());
        let rec = record("h1");
        store.save(&key, &rec).await.unwrap();
        assert_eq!(store.load(&key).await.unwrap(), Some(rec));
        assert!(store.record_path(&key).exists());
    }

    #[tokio::test]
    async fn file_store_replaces_wholesale() {
        let tmp = TempDir::new().unwrap();
        let store = FileIndexStore::new(tmp.path());
        let key = derive_key(Path::new("/docs/a.pdf"));

        store.save(&key, &record("h1")).await.unwrap();
        store.save(&key, &record("h2")).await.unwrap();
        assert_eq!(store.load(&key).await.unwrap().unwrap().content_hash, "h2");

        // No temp files left behind next to the record.
        let entries = std::fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn corrupt_record_loads_as_absent() {
        let tmp = TempDir::new().unwrap();
        let store = FileIndexStore::new(tmp.path());
        let key = derive_key(Path::new("/docs/a.pdf"));
        std::fs::write(store.record_path(&key), b"{ not json").unwrap();

        assert!(store.load(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_into_unwritable_location_fails() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        // Index dir path is an existing regular file.
        let store = FileIndexStore::new(&blocker);
        let key = derive_key(Path::new("/docs/a.pdf"));

        assert!(store.save(&key, &record("h")).await.is_err());
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryIndexStore::new();
        let key = derive_key(Path::new("/docs/a.pdf"));
        assert!(store.is_empty());
        store.save(&key, &record("h")).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load(&key).await.unwrap().unwrap().content_hash, "h");
    }
}
