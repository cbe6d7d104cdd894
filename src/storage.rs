//! Persistence collaborators
//!
//! The phrase store talks to two narrow seams:
//! - [`KeyValueStore`]: async get/set of opaque string blobs (the slot
//!   array, board config, and preferences serialize to strings).
//! - [`BlobStore`]: persists image binaries and returns a stable URI;
//!   deletion is tolerant of files that are already gone.
//!
//! File-backed implementations live here alongside in-memory ones used as
//! test doubles and for ephemeral sessions.

use crate::error::{BlobError, StorageError};
use async_trait::async_trait;
use directories::ProjectDirs;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Trait for the persistent key-value backend
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Trait for the image blob store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist the image at `source_uri` and return a stable URI.
    ///
    /// Idempotent: a URI this store already owns is returned unchanged
    /// rather than re-copied.
    async fn save_image_from_source(&self, source_uri: &str) -> Result<String, BlobError>;

    /// Delete a persisted image. Missing files and URIs this store does
    /// not own are not failures; trouble is logged and swallowed.
    async fn delete_image(&self, uri: &str);
}

/// In-memory key-value store
///
/// Backs unit tests and ephemeral sessions. Supports injected write
/// failures so callers' best-effort persistence paths can be exercised.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a key, bypassing the trait (test setup).
    pub fn seed(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    /// Make subsequent `set` calls fail (test harness).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed {
                key: key.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-backed key-value store with a same-process fallback cache
///
/// Each key maps to one file under the data directory. Every write lands
/// in the in-process cache before touching disk, and reads fall back to
/// the cache when the file is unreadable, so the session keeps working with
/// state that is ahead of disk.
pub struct FileKeyValueStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, String>>,
}

impl FileKeyValueStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Store rooted at the platform data directory
    /// (e.g. `~/.local/share/phraseboard/kv` on Linux).
    pub fn in_data_dir() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("", "", "phraseboard").ok_or_else(|| {
            StorageError::ReadFailed {
                key: String::new(),
                reason: "could not determine data directory".to_string(),
            }
        })?;
        Ok(Self::new(dirs.data_dir().join("kv")))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are fixed identifiers; strip anything path-like anyway.
        let safe: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => {
                self.cache
                    .lock()
                    .unwrap()
                    .insert(key.to_string(), value.clone());
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(self.cache.lock().unwrap().get(key).cloned())
            }
            Err(e) => {
                tracing::warn!("Failed to read {:?}, falling back to cache: {}", path, e);
                Ok(self.cache.lock().unwrap().get(key).cloned())
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // Cache first so the session sees the write even if disk fails.
        self.cache
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());

        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::WriteFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;
        }
        tokio::fs::write(&path, value)
            .await
            .map_err(|e| StorageError::WriteFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }
}

/// File-backed image blob store
///
/// Images are copied into the data directory under unique `btn_img_*`
/// names; the returned URI is the destination path. URIs outside the data
/// directory (e.g. built-in icon assets) are never deleted.
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Store rooted at the platform data directory.
    pub fn in_data_dir() -> Result<Self, BlobError> {
        let dirs = ProjectDirs::from("", "", "phraseboard")
            .ok_or_else(|| BlobError::DirUnavailable("no data directory".to_string()))?;
        Ok(Self::new(dirs.data_dir().join("images")))
    }

    fn strip_scheme(uri: &str) -> &str {
        uri.strip_prefix("file://").unwrap_or(uri)
    }

    /// Whether `uri` points into this store's directory.
    pub fn owns(&self, uri: &str) -> bool {
        Path::new(Self::strip_scheme(uri)).starts_with(&self.dir)
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn save_image_from_source(&self, source_uri: &str) -> Result<String, BlobError> {
        // Already one of ours: reuse instead of re-copying.
        if self.owns(source_uri) {
            return Ok(source_uri.to_string());
        }

        let source = Path::new(Self::strip_scheme(source_uri));
        if !source.is_file() {
            return Err(BlobError::SourceMissing(source_uri.to_string()));
        }

        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg");
        let dest = self.dir.join(format!("btn_img_{}.{ext}", uuid::Uuid::new_v4()));

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BlobError::DirUnavailable(e.to_string()))?;
        tokio::fs::copy(source, &dest)
            .await
            .map_err(|e| BlobError::CopyFailed {
                source_uri: source_uri.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!("Persisted image {:?} -> {:?}", source, dest);
        Ok(dest.to_string_lossy().into_owned())
    }

    async fn delete_image(&self, uri: &str) {
        if !self.owns(uri) {
            tracing::debug!("Skipping delete of non-owned image uri: {}", uri);
            return;
        }
        let path = Path::new(Self::strip_scheme(uri));
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!("Deleted image {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to delete image {:?}: {}", path, e),
        }
    }
}

/// In-memory blob store recording per-URI delete counts
///
/// The single-owner invariant ("replacing a slot image deletes the old
/// blob exactly once") is asserted against these counts in store tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    inner: Mutex<MemoryBlobInner>,
}

#[derive(Default)]
struct MemoryBlobInner {
    next_id: u64,
    sources: HashMap<String, String>,
    delete_counts: HashMap<String, usize>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `delete_image` has been called for `uri`.
    pub fn delete_count(&self, uri: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .delete_counts
            .get(uri)
            .copied()
            .unwrap_or(0)
    }

    /// The source URI a persisted blob was copied from, if it exists.
    pub fn source_of(&self, uri: &str) -> Option<String> {
        self.inner.lock().unwrap().sources.get(uri).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn save_image_from_source(&self, source_uri: &str) -> Result<String, BlobError> {
        if source_uri.starts_with("mem://blob/") {
            return Ok(source_uri.to_string());
        }
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let uri = format!("mem://blob/{}", inner.next_id);
        inner.sources.insert(uri.clone(), source_uri.to_string());
        Ok(uri)
    }

    async fn delete_image(&self, uri: &str) {
        let mut inner = self.inner.lock().unwrap();
        *inner.delete_counts.entry(uri.to_string()).or_insert(0) += 1;
        inner.sources.remove(uri);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_kv_round_trip() {
        let kv = MemoryKeyValueStore::new();
        assert_eq!(kv.get("missing").await.unwrap(), None);
        kv.set("k", "v").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_memory_kv_injected_write_failure() {
        let kv = MemoryKeyValueStore::new();
        kv.set_fail_writes(true);
        assert!(kv.set("k", "v").await.is_err());
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_kv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKeyValueStore::new(dir.path().to_path_buf());
        kv.set("phrase-slots", r#"["a"]"#).await.unwrap();
        assert_eq!(
            kv.get("phrase-slots").await.unwrap().as_deref(),
            Some(r#"["a"]"#)
        );
        // value survives a fresh store over the same directory
        let fresh = FileKeyValueStore::new(dir.path().to_path_buf());
        assert_eq!(
            fresh.get("phrase-slots").await.unwrap().as_deref(),
            Some(r#"["a"]"#)
        );
    }

    #[tokio::test]
    async fn test_file_kv_falls_back_to_cache_when_file_gone() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKeyValueStore::new(dir.path().join("kv"));
        kv.set("k", "cached").await.unwrap();
        // simulate disk trouble after the write
        std::fs::remove_file(dir.path().join("kv").join("k.json")).unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("cached"));
    }

    #[tokio::test]
    async fn test_file_kv_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKeyValueStore::new(dir.path().to_path_buf());
        kv.set("../escape/attempt", "v").await.unwrap();
        assert_eq!(kv.get("../escape/attempt").await.unwrap().as_deref(), Some("v"));
        // nothing landed outside the store directory
        assert!(!dir.path().parent().unwrap().join("escape").exists());
    }

    #[tokio::test]
    async fn test_file_blob_copy_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("picked.png");
        std::fs::write(&source, b"png bytes").unwrap();

        let blobs = FileBlobStore::new(dir.path().join("images"));
        let uri = blobs
            .save_image_from_source(source.to_str().unwrap())
            .await
            .unwrap();
        assert!(uri.contains("btn_img_"));
        assert!(uri.ends_with(".png"));
        assert_eq!(std::fs::read(&uri).unwrap(), b"png bytes");

        blobs.delete_image(&uri).await;
        assert!(!Path::new(&uri).exists());
        // deleting again is not a failure
        blobs.delete_image(&uri).await;
    }

    #[tokio::test]
    async fn test_file_blob_reuses_already_persisted_uri() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("picked.jpg");
        std::fs::write(&source, b"jpeg").unwrap();

        let blobs = FileBlobStore::new(dir.path().join("images"));
        let uri = blobs
            .save_image_from_source(source.to_str().unwrap())
            .await
            .unwrap();
        let again = blobs.save_image_from_source(&uri).await.unwrap();
        assert_eq!(uri, again);
    }

    #[tokio::test]
    async fn test_file_blob_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FileBlobStore::new(dir.path().join("images"));
        let err = blobs
            .save_image_from_source("/nonexistent/picked.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::SourceMissing(_)));
    }

    #[test]
    fn test_copy_failure_message_names_the_source() {
        let err = BlobError::CopyFailed {
            source_uri: "picked://broken".to_string(),
            reason: "disk full".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to persist image from 'picked://broken': disk full"
        );
    }

    #[tokio::test]
    async fn test_file_blob_never_deletes_non_owned_uris() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("builtin-icon.svg");
        std::fs::write(&outside, b"<svg/>").unwrap();

        let blobs = FileBlobStore::new(dir.path().join("images"));
        blobs.delete_image(outside.to_str().unwrap()).await;
        assert!(outside.exists());
    }

    #[tokio::test]
    async fn test_memory_blob_counts_deletes() {
        let blobs = MemoryBlobStore::new();
        let uri = blobs.save_image_from_source("picked://a").await.unwrap();
        assert_eq!(blobs.source_of(&uri).as_deref(), Some("picked://a"));
        blobs.delete_image(&uri).await;
        blobs.delete_image(&uri).await;
        assert_eq!(blobs.delete_count(&uri), 2);
        assert_eq!(blobs.source_of(&uri), None);
    }

    #[tokio::test]
    async fn test_memory_blob_idempotent_persist() {
        let blobs = MemoryBlobStore::new();
        let uri = blobs.save_image_from_source("picked://a").await.unwrap();
        assert_eq!(blobs.save_image_from_source(&uri).await.unwrap(), uri);
    }
}
