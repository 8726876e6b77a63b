//! LFS object store selection.

pub mod s3;

use std::sync::Arc;

use anyhow::{Context, Result};
use git_http::{FsObjectStore, ObjectStore};

use crate::config::LfsStorage;
use crate::db::normalize_path;

pub use s3::S3ObjectStore;

/// Build the configured backend once at startup.
pub async fn build_object_store(storage: &LfsStorage) -> Result<Arc<dyn ObjectStore>> {
    match storage {
        LfsStorage::Filesystem(root) => {
            let root = normalize_path(root.clone())?;
            std::fs::create_dir_all(&root)
                .with_context(|| format!("failed to create LFS root: {}", root.display()))?;
            tracing::info!(root = %root.display(), "LFS objects stored on the filesystem");
            Ok(Arc::new(FsObjectStore::new(root)))
        }
        LfsStorage::S3(settings) => {
            let client = s3::build_s3_client(settings).await?;
            tracing::info!(bucket = %settings.bucket, prefix = %settings.prefix, "LFS objects stored in S3");
            Ok(Arc::new(S3ObjectStore::new(
                client,
                settings.bucket.clone(),
                settings.prefix.clone(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn filesystem_backend_creates_its_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("lfs");
        let store = build_object_store(&LfsStorage::Filesystem(root.clone()))
            .await
            .unwrap();
        assert!(root.is_dir());
        assert!(!store.exists("abcd").await.unwrap());
    }
}
