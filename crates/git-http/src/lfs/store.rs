use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncRead;

pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// An object opened for streaming, with the size reported by the backend.
pub struct StoredObject {
    pub reader: ObjectReader,
    pub size: u64,
}

impl std::fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredObject").field("size", &self.size).finish_non_exhaustive()
    }
}

/// Content-addressed blob storage keyed by LFS oid.
///
/// Absence is reported through `Option`/`bool`; `Err` always means the
/// backend itself failed. Uploading to an existing key replaces the object
/// atomically.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store everything `reader` yields under `key` and return the byte count.
    ///
    /// When `expected_len` is given, a body of any other length is rejected
    /// and nothing is stored.
    async fn upload(&self, key: &str, reader: ObjectReader, expected_len: Option<u64>) -> Result<u64>;

    async fn download(&self, key: &str) -> Result<Option<StoredObject>>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn size(&self, key: &str) -> Result<Option<u64>>;

    /// Returns whether an object was removed.
    async fn delete(&self, key: &str) -> Result<bool>;
}
