/// S3-backed blob store
use super::{BlobError, BlobStore};
use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct S3BlobStore {
    client: Arc<Client>,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: Arc<Client>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the ambient AWS environment plus `config`
    pub async fn from_config(config: &StorageConfig) -> Self {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if !config.endpoint.is_empty() {
            builder = builder.endpoint_url(&config.endpoint).force_path_style(true);
        }

        Self::new(Arc::new(Client::from_conf(builder.build())), &config.bucket)
    }

    async fn get(&self, key: &str, range: Option<String>) -> Result<Bytes, BlobError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_range(range)
            .send()
            .await
            .map_err(|err| {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false);
                if not_found {
                    BlobError::NotFound(key.to_string())
                } else {
                    BlobError::Io(format!("get {key}: {err}"))
                }
            })?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| BlobError::Io(format!("read {key}: {e}")))?;

        Ok(body.into_bytes())
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn read_prefix(&self, key: &str, n: usize) -> Result<Bytes, BlobError> {
        if n == 0 {
            return Ok(Bytes::new());
        }
        let mut data = self.get(key, Some(format!("bytes=0-{}", n - 1))).await?;
        // Servers ignoring Range send the whole object
        data.truncate(n);
        Ok(data)
    }

    async fn read_all(&self, key: &str) -> Result<Bytes, BlobError> {
        self.get(key, None).await
    }

    async fn put(&self, key: &str, data: Bytes, mime_type: &str) -> Result<(), BlobError> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(mime_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| BlobError::Io(format!("put {key}: {e}")))?;

        debug!(key, size, mime_type, "blob stored");
        Ok(())
    }
}
