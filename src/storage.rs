use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
}

/// Flat directory of files, one per key.
#[derive(Clone, Debug)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    /// Creates the root directory if it does not exist yet.
    pub async fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create storage dir {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        anyhow::ensure!(
            !key.is_empty() && !key.contains(['/', '\\']) && key != "." && key != "..",
            "invalid storage key {:?}",
            key
        );
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StorageClient for LocalDiskStorage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        tracing::debug!(key, content_type, bytes = body.len(), "object stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_creates_file_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDiskStorage::new(dir.path().join("images")).await.unwrap();

        storage
            .put_object("1700000000000.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        let path = storage.root().join("1700000000000.png");
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"png");
    }

    #[tokio::test]
    async fn same_key_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDiskStorage::new(dir.path()).await.unwrap();

        storage
            .put_object("a.gif", Bytes::from_static(b"first"), "image/gif")
            .await
            .unwrap();
        storage
            .put_object("a.gif", Bytes::from_static(b"second"), "image/gif")
            .await
            .unwrap();
        assert_eq!(
            tokio::fs::read(dir.path().join("a.gif")).await.unwrap(),
            b"second"
        );
    }

    #[tokio::test]
    async fn rejects_keys_that_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDiskStorage::new(dir.path()).await.unwrap();

        for key in ["../evil.png", "sub/dir.png", "..", ""] {
            assert!(storage
                .put_object(key, Bytes::from_static(b"x"), "image/png")
                .await
                .is_err());
        }
    }
}
