//! Storage backend contract and implementations.
//!
//! Records address their blob through a `(disk, path)` pair; the disk name
//! resolves to a backend through an explicit [`DiskSet`] handed to the
//! lifecycle and responder at construction. There is no process-wide disk
//! registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

use attache_core::config::StorageConfig;

/// Boxed async reader used for streamed blob I/O.
pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Metadata reported after a successful write.
#[derive(Debug, Clone)]
pub struct WriteMetadata {
    /// Bytes written
    pub size: u64,
    /// SHA256 digest of the content, hex-encoded
    pub digest: String,
}

/// Key/value blob store addressed by a backend-relative path string.
///
/// The core never assumes a concrete implementation; anything satisfying
/// this capability set is pluggable, selected per-record by disk name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write `data` at `path`, creating or overwriting the blob.
    async fn put(&self, path: &str, data: Bytes) -> StorageResult<WriteMetadata>;

    /// Write a byte stream at `path` without buffering it whole.
    async fn put_stream(&self, path: &str, reader: BoxReader) -> StorageResult<WriteMetadata>;

    /// Open a read stream. Fails with [`StorageError::NotFound`] when the
    /// blob is absent.
    async fn read_stream(&self, path: &str) -> StorageResult<BoxReader>;

    /// Whether a blob exists at `path`.
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Delete the blob at `path`. Deleting an absent blob succeeds.
    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// Last-modified timestamp, or `None` when the blob is absent.
    async fn last_modified(&self, path: &str) -> StorageResult<Option<DateTime<Utc>>>;

    /// Public URL for the blob at `path`.
    fn url(&self, path: &str) -> String;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Explicit disk-name to backend mapping, passed in as a dependency.
#[derive(Clone, Default)]
pub struct DiskSet {
    disks: HashMap<String, Arc<dyn StorageBackend>>,
}

impl DiskSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, backend: Arc<dyn StorageBackend>) -> Self {
        self.disks.insert(name.into(), backend);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StorageBackend>> {
        self.disks.get(name).cloned()
    }

    /// Build local-disk backends from configuration.
    pub fn from_config(config: &StorageConfig) -> Self {
        let mut set = Self::new();
        for (name, disk) in &config.disks {
            set = set.register(
                name.clone(),
                Arc::new(DiskStorage::new(name.clone(), &disk.root, &disk.base_url)),
            );
        }
        set
    }
}

/// Local filesystem backend rooted at a directory.
pub struct DiskStorage {
    name: String,
    root: PathBuf,
    base_url: String,
}

impl DiskStorage {
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: root.as_ref().to_path_buf(),
            base_url: base_url.into(),
        }
    }

    /// Resolve a backend-relative path to a full one, rejecting traversal.
    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        if path.contains("..") || path.starts_with('/') || path.starts_with('\\') {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(path))
    }

    async fn ensure_parent(&self, full: &Path) -> StorageResult<()> {
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for DiskStorage {
    async fn put(&self, path: &str, data: Bytes) -> StorageResult<WriteMetadata> {
        let full = self.resolve(path)?;
        self.ensure_parent(&full).await?;

        let digest = hex::encode(Sha256::digest(&data));
        let size = data.len() as u64;

        let mut file = fs::File::create(&full).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;

        debug!(disk = %self.name, path, size, "blob stored");

        Ok(WriteMetadata { size, digest })
    }

    async fn put_stream(&self, path: &str, mut reader: BoxReader) -> StorageResult<WriteMetadata> {
        let full = self.resolve(path)?;
        self.ensure_parent(&full).await?;

        let mut file = fs::File::create(&full).await?;
        let mut hasher = Sha256::new();
        let mut size = 0u64;
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).await?;
            size += n as u64;
        }
        file.sync_all().await?;

        debug!(disk = %self.name, path, size, "blob streamed to disk");

        Ok(WriteMetadata {
            size,
            digest: hex::encode(hasher.finalize()),
        })
    }

    async fn read_stream(&self, path: &str) -> StorageResult<BoxReader> {
        let full = self.resolve(path)?;
        let file = fs::File::open(&full).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
            _ => StorageError::Io(e),
        })?;
        Ok(Box::new(file))
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let full = self.resolve(path)?;
        Ok(fs::try_exists(&full).await.unwrap_or(false))
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full).await {
            Ok(()) => {
                debug!(disk = %self.name, path, "blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn last_modified(&self, path: &str) -> StorageResult<Option<DateTime<Utc>>> {
        let full = self.resolve(path)?;
        match fs::metadata(&full).await {
            Ok(meta) => Ok(meta.modified().ok().map(DateTime::from)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// In-memory backend for testing.
pub struct MemoryStorage {
    blobs: tokio::sync::RwLock<HashMap<String, (Bytes, DateTime<Utc>)>>,
    base_url: String,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            blobs: tokio::sync::RwLock::new(HashMap::new()),
            base_url: "/memory".to_string(),
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn put(&self, path: &str, data: Bytes) -> StorageResult<WriteMetadata> {
        let meta = WriteMetadata {
            size: data.len() as u64,
            digest: hex::encode(Sha256::digest(&data)),
        };
        let mut blobs = self.blobs.write().await;
        blobs.insert(path.to_string(), (data, Utc::now()));
        Ok(meta)
    }

    async fn put_stream(&self, path: &str, mut reader: BoxReader) -> StorageResult<WriteMetadata> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        self.put(path, Bytes::from(data)).await
    }

    async fn read_stream(&self, path: &str) -> StorageResult<BoxReader> {
        let blobs = self.blobs.read().await;
        let (data, _) = blobs
            .get(path)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
        Ok(Box::new(std::io::Cursor::new(data.clone())))
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        Ok(self.blobs.read().await.contains_key(path))
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        self.blobs.write().await.remove(path);
        Ok(())
    }

    async fn last_modified(&self, path: &str) -> StorageResult<Option<DateTime<Utc>>> {
        Ok(self.blobs.read().await.get(path).map(|(_, at)| *at))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Generate a collision-free backend path for an uploaded filename.
pub fn generate_path(filename: &str) -> String {
    let date = Utc::now().format("%Y/%m/%d");
    format!("{}/{}/{}", date, Uuid::new_v4(), filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_put_then_read_stream_round_trips() {
        let storage = MemoryStorage::new();
        let data = Bytes::from("Hello, World!");

        let meta = storage.put("a/b.txt", data.clone()).await.unwrap();
        assert_eq!(meta.size, 13);
        assert_eq!(meta.digest.len(), 64);

        let mut reader = storage.read_stream("a/b.txt").await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn memory_put_stream_matches_put() {
        let storage = MemoryStorage::new();
        let data = Bytes::from("streamed content");

        let direct = storage.put("a.bin", data.clone()).await.unwrap();
        let streamed = storage
            .put_stream("b.bin", Box::new(std::io::Cursor::new(data)))
            .await
            .unwrap();

        assert_eq!(direct.size, streamed.size);
        assert_eq!(direct.digest, streamed.digest);
    }

    #[tokio::test]
    async fn memory_delete_and_exists() {
        let storage = MemoryStorage::new();
        storage.put("x.txt", Bytes::from("x")).await.unwrap();
        assert!(storage.exists("x.txt").await.unwrap());

        storage.delete("x.txt").await.unwrap();
        assert!(!storage.exists("x.txt").await.unwrap());
        // Deleting an absent blob is fine.
        storage.delete("x.txt").await.unwrap();
    }

    #[tokio::test]
    async fn memory_read_missing_is_not_found() {
        let storage = MemoryStorage::new();
        let result = storage.read_stream("nope.txt").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert_eq!(storage.last_modified("nope.txt").await.unwrap(), None);
    }

    fn temp_disk() -> DiskStorage {
        let root = std::env::temp_dir().join(format!("attache-test-{}", Uuid::new_v4()));
        DiskStorage::new("local", root, "/files")
    }

    #[tokio::test]
    async fn disk_round_trip_and_overwrite() {
        let storage = temp_disk();

        storage.put("doc/a.txt", Bytes::from("first")).await.unwrap();
        storage.put("doc/a.txt", Bytes::from("second")).await.unwrap();

        let mut reader = storage.read_stream("doc/a.txt").await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"second");

        assert!(storage.last_modified("doc/a.txt").await.unwrap().is_some());

        storage.delete("doc/a.txt").await.unwrap();
        assert!(!storage.exists("doc/a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn disk_rejects_path_traversal() {
        let storage = temp_disk();
        let result = storage.read_stream("../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));

        let result = storage.put("/absolute", Bytes::from("x")).await;
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));
    }

    #[test]
    fn disk_url_joins_base() {
        let storage = DiskStorage::new("local", "/tmp", "/files/");
        assert_eq!(storage.url("2024/a.png"), "/files/2024/a.png");
    }

    #[test]
    fn disk_set_resolves_by_name() {
        let set = DiskSet::new().register("mem", Arc::new(MemoryStorage::new()));
        assert!(set.get("mem").is_some());
        assert!(set.get("s3").is_none());
    }

    #[test]
    fn disk_set_from_config_builds_all_disks() {
        let config = attache_core::config::AppConfig::default();
        let set = DiskSet::from_config(&config.storage);
        assert!(set.get("local").is_some());
        assert_eq!(set.get("local").unwrap().url("a.txt"), "/files/a.txt");
    }

    #[test]
    fn generated_paths_are_unique_and_keep_filename() {
        let a = generate_path("report.pdf");
        let b = generate_path("report.pdf");
        assert_ne!(a, b);
        assert!(a.ends_with("/report.pdf"));
    }
}
