use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::is_valid_oid;
use super::store::{ObjectReader, ObjectStore, StoredObject};

/// Objects on local disk under `<root>/<oid[0..2]>/<oid[2..4]>/<oid>`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        anyhow::ensure!(is_valid_oid(key), "invalid object key `{key}`");
        let path = match (key.get(..2), key.get(2..4)) {
            (Some(a), Some(b)) => self.root.join(a).join(b).join(key),
            _ => self.root.join(key),
        };
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn upload(&self, key: &str, mut reader: ObjectReader, expected_len: Option<u64>) -> Result<u64> {
        let path = self.path_for(key)?;
        let dir = path.parent().unwrap_or(&self.root);
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let tmp = dir.join(format!(".{key}.tmp-{:016x}", rand::random::<u64>()));
        let written = async {
            let mut file = tokio::fs::File::create(&tmp)
                .await
                .with_context(|| format!("failed to create {}", tmp.display()))?;
            let n = tokio::io::copy(&mut reader, &mut file)
                .await
                .with_context(|| format!("failed to write {}", tmp.display()))?;
            file.flush().await?;
            file.sync_all().await?;
            if let Some(expected) = expected_len {
                anyhow::ensure!(n == expected, "object {key}: expected {expected} bytes, received {n}");
            }
            Ok::<_, anyhow::Error>(n)
        }
        .await;

        let n = match written {
            Ok(n) => n,
            Err(err) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(err);
            }
        };

        if let Err(err) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err).with_context(|| format!("failed to move object into {}", path.display()));
        }

        tracing::debug!(oid = key, bytes = n, "stored object");
        Ok(n)
    }

    async fn download(&self, key: &str) -> Result<Option<StoredObject>> {
        let path = self.path_for(key)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("failed to open {}", path.display())),
        };
        let size = file.metadata().await?.len();
        Ok(Some(StoredObject {
            reader: Box::pin(file),
            size,
        }))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("failed to stat {}", path.display()))
    }

    async fn size(&self, key: &str) -> Result<Option<u64>> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to stat {}", path.display())),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
        }
    }
}
