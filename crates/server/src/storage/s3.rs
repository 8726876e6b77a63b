use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use git_http::lfs::{ObjectReader, ObjectStore, StoredObject};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::config::S3Settings;

pub async fn build_s3_client(settings: &S3Settings) -> Result<Client> {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &settings.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(endpoint) = &settings.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let shared = loader.load().await;

    // Custom endpoints get path-style bucket addressing.
    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(settings.endpoint.is_some())
        .build();

    let client = Client::from_conf(s3_config);
    tracing::info!(
        bucket = %settings.bucket,
        region = settings.region.as_deref().unwrap_or("default"),
        endpoint = settings.endpoint.as_deref().unwrap_or("aws"),
        "S3 client initialised"
    );
    Ok(client)
}

/// LFS objects in one bucket under `<prefix><oid>`.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String, prefix: String) -> Self {
        Self {
            client,
            bucket,
            prefix,
        }
    }

    fn s3_key(&self, oid: &str) -> String {
        format!("{}{}", self.prefix, oid)
    }

    async fn head(&self, key: &str) -> Result<Option<u64>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(out) => Ok(Some(out.content_length().unwrap_or_default().max(0) as u64)),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(None),
            Err(err) => Err(err).context("S3 HeadObject"),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, reader), fields(bucket = %self.bucket))]
    async fn upload(&self, key: &str, mut reader: ObjectReader, expected_len: Option<u64>) -> Result<u64> {
        // PutObject needs the length up front, so the body is spooled first.
        let spool = tempfile::NamedTempFile::new().context("create upload spool file")?;
        let mut file = tokio::fs::File::from_std(spool.reopen().context("reopen spool file")?);
        let n = tokio::io::copy(&mut reader, &mut file)
            .await
            .context("spool upload body")?;
        file.flush().await?;
        drop(file);

        if let Some(expected) = expected_len {
            anyhow::ensure!(n == expected, "object {key}: expected {expected} bytes, received {n}");
        }

        let body = ByteStream::from_path(spool.path())
            .await
            .context("open spool file for upload")?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.s3_key(key))
            .content_length(n as i64)
            .body(body)
            .send()
            .await
            .context("S3 PutObject")?;

        debug!(bytes = n, "object uploaded");
        Ok(n)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn download(&self, key: &str) -> Result<Option<StoredObject>> {
        let out = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.s3_key(key))
            .send()
            .await
        {
            Ok(out) => out,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                debug!("object does not exist");
                return Ok(None);
            }
            Err(err) => return Err(err).context("S3 GetObject"),
        };

        let size = out.content_length().unwrap_or_default().max(0) as u64;
        Ok(Some(StoredObject {
            reader: Box::pin(out.body.into_async_read()),
            size,
        }))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.head(&self.s3_key(key)).await?.is_some())
    }

    async fn size(&self, key: &str) -> Result<Option<u64>> {
        self.head(&self.s3_key(key)).await
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete(&self, key: &str) -> Result<bool> {
        let s3_key = self.s3_key(key);
        // DeleteObject succeeds for missing keys, so presence is checked first.
        if self.head(&s3_key).await?.is_none() {
            return Ok(false);
        }
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(s3_key)
            .send()
            .await
            .context("S3 DeleteObject")?;
        debug!("object deleted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_carry_the_prefix() {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        let store = S3ObjectStore::new(Client::from_conf(config), "bucket".into(), "lfs/".into());
        assert_eq!(store.s3_key("abc123"), "lfs/abc123");
    }
}
