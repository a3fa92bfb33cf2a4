use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at `base_path` (e.g. `uploads`),
    /// creating the directory when missing.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert a storage key to a filesystem path, rejecting keys that
    /// would resolve outside the base directory.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if !validate_key(key) {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(key);

        if let (Ok(canonical), Ok(base_canonical)) =
            (path.canonicalize(), self.base_path.canonicalize())
        {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

/// Sibling path for an in-progress write; renamed over the target once
/// the bytes are synced.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
}

async fn write_file(path: &Path, data: &[u8]) -> StorageResult<()> {
    let mut file = fs::File::create(path).await.map_err(|e| {
        StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
    })?;

    file.write_all(data).await.map_err(|e| {
        StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
    })?;

    file.sync_all().await.map_err(|e| {
        StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
    })
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<StoredObject> {
        let path = self.key_to_path(key)?;
        let location = path.display().to_string();
        let size = data.len();

        // Same key means same content hash, so only the length can differ
        // when a previous write was cut short.
        match fs::metadata(&path).await {
            Ok(meta) if meta.len() == size as u64 => {
                tracing::debug!(key = %key, "Object already stored, skipping write");
                return Ok(StoredObject {
                    key: key.to_string(),
                    location,
                    written: false,
                });
            }
            Ok(meta) => {
                tracing::warn!(
                    key = %key,
                    stored_bytes = meta.len(),
                    expected_bytes = size,
                    "Stored object has the wrong size, rewriting"
                );
            }
            Err(_) => {}
        }

        self.ensure_parent_dir(&path).await?;
        let start = std::time::Instant::now();

        let tmp_path = temp_path_for(&path);
        if let Err(e) = write_file(&tmp_path, &data).await {
            if let Err(cleanup) = fs::remove_file(&tmp_path).await {
                tracing::debug!(error = %cleanup, path = %tmp_path.display(), "No temp file to remove");
            }
            return Err(e);
        }

        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to move file into place {}: {}",
                path.display(),
                e
            )));
        }

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(StoredObject {
            key: key.to_string(),
            location,
            written: true,
        })
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(path = %path.display(), key = %key, "Local storage delete successful");
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        self.base_path.join(key).display().to_string()
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use crate::keys::content_key;
    use tempfile::tempdir;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        let key = content_key(Uuid::new_v4(), Uuid::new_v4(), "abc", "notes.txt");

        let stored = storage.put(&key, b"milestones".to_vec()).await.unwrap();
        assert!(stored.written);
        assert!(stored.location.ends_with("notes.txt"));
        assert_eq!(storage.get(&key).await.unwrap(), b"milestones");
    }

    #[tokio::test]
    async fn test_identical_put_is_skipped() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        let key = content_key(Uuid::new_v4(), Uuid::new_v4(), "abc", "notes.txt");

        let first = storage.put(&key, b"same".to_vec()).await.unwrap();
        let second = storage.put(&key, b"same".to_vec()).await.unwrap();

        assert!(first.written);
        assert!(!second.written);
        assert_eq!(first.location, second.location);
    }

    #[tokio::test]
    async fn test_dots_inside_filename_are_stored() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        let key = content_key(Uuid::new_v4(), Uuid::new_v4(), "abc", "Roadmap..final.txt");

        let stored = storage.put(&key, b"hello".to_vec()).await.unwrap();
        assert!(stored.written);
        assert_eq!(storage.get(&key).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_truncated_object_is_rewritten() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        let key = content_key(Uuid::new_v4(), Uuid::new_v4(), "abc", "plan.pdf");

        let path = dir.path().join(&key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"parti").unwrap();

        let stored = storage.put(&key, b"partial no more".to_vec()).await.unwrap();
        assert!(stored.written);
        assert_eq!(storage.get(&key).await.unwrap(), b"partial no more");
    }

    #[tokio::test]
    async fn test_put_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        let key = content_key(Uuid::new_v4(), Uuid::new_v4(), "abc", "notes.txt");

        storage.put(&key, b"milestones".to_vec()).await.unwrap();

        let parent = dir.path().join(&key);
        let names: Vec<String> = std::fs::read_dir(parent.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["notes.txt".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_write_leaves_nothing_behind() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        let key = "t/p/abc/notes.txt";
        let parent = dir.path().join("t/p/abc");
        std::fs::create_dir_all(&parent).unwrap();
        std::fs::set_permissions(&parent, std::fs::Permissions::from_mode(0o555)).unwrap();

        let result = storage.put(key, b"milestones".to_vec()).await;
        std::fs::set_permissions(&parent, std::fs::Permissions::from_mode(0o755)).unwrap();

        // Root ignores directory permissions; only assert when the write failed.
        if result.is_err() {
            assert!(matches!(result, Err(StorageError::UploadFailed(_))));
            assert_eq!(std::fs::read_dir(&parent).unwrap().count(), 0);
            assert!(!storage.exists(key).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let result = storage.get("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        assert!(!storage.exists("a/b/c.txt").await.unwrap());
        assert!(matches!(
            storage.get("a/b/c.txt").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(storage.delete("a/b/c.txt").await.is_ok());
    }
}
