use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// URL prefix under which the upload root is served.
pub const PUBLIC_PREFIX: &str = "/uploads";

#[async_trait]
pub trait StorageService: Send + Sync {
    async fn upload_file(&self, key: &str, data: &[u8]) -> Result<()>;
    async fn delete_file(&self, key: &str) -> Result<()>;

    /// Public URL for a stored key, e.g. `thumbnails/thumb-a.jpg` -> `/uploads/thumbnails/thumb-a.jpg`.
    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", PUBLIC_PREFIX, key)
    }

    /// Inverse of [`StorageService::public_url`]. Returns `None` for URLs outside the upload root.
    fn key_from_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(PUBLIC_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
            .map(|key| key.to_string())
    }
}

/// Stores uploads as plain files below a root directory.
pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key onto the filesystem, refusing anything that could escape the root.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(anyhow!("Invalid storage key: {}", key));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn upload_file(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write to a sibling then rename so a crash never leaves a half-written upload.
        let mut partial = path.clone().into_os_string();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        let written = match tokio::fs::write(&partial, data).await {
            Ok(()) => tokio::fs::rename(&partial, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(storage_key = %key, "Failed to remove partial file: {}", cleanup);
            }
            return Err(e.into());
        }

        tracing::debug!(storage_key = %key, size = data.len(), "file written");
        Ok(())
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        tokio::fs::remove_file(&path).await?;
        tracing::debug!(storage_key = %key, "file deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_storage_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path());

        storage
            .upload_file("thumbnails/thumb-a.jpg", b"jpeg")
            .await
            .unwrap();
        let path = dir.path().join("thumbnails/thumb-a.jpg");
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg");
        assert!(!dir.path().join("thumbnails/thumb-a.jpg.part").exists());

        storage.delete_file("thumbnails/thumb-a.jpg").await.unwrap();
        assert!(!path.exists());
        assert!(storage.delete_file("thumbnails/thumb-a.jpg").await.is_err());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path());

        // Every write through this link fails with ENOSPC
        let partial = dir.path().join("full.png.part");
        std::os::unix::fs::symlink("/dev/full", &partial).unwrap();

        assert!(storage.upload_file("full.png", b"png").await.is_err());
        assert!(std::fs::symlink_metadata(&partial).is_err());
        assert!(!dir.path().join("full.png").exists());
    }

    #[tokio::test]
    async fn test_failed_rename_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path());

        // A non-empty directory cannot be replaced by a file
        std::fs::create_dir_all(dir.path().join("taken.png/inner")).unwrap();

        assert!(storage.upload_file("taken.png", b"png").await.is_err());
        assert!(!dir.path().join("taken.png.part").exists());
    }

    #[tokio::test]
    async fn test_rejects_keys_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path());

        assert!(storage.upload_file("../escape.txt", b"x").await.is_err());
        assert!(storage.upload_file("/etc/passwd", b"x").await.is_err());
        assert!(storage.upload_file("", b"x").await.is_err());
    }

    #[test]
    fn test_public_url_mapping() {
        let storage = LocalStorageService::new("/srv/uploads");
        let url = storage.public_url("cases/cover-1.png");
        assert_eq!(url, "/uploads/cases/cover-1.png");
        assert_eq!(
            storage.key_from_url(&url).as_deref(),
            Some("cases/cover-1.png")
        );
        assert_eq!(storage.key_from_url("https://elsewhere/x.png"), None);
        assert_eq!(storage.key_from_url("/uploads/"), None);
    }
}
