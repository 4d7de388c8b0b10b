//! Blob store boundary
//!
//! The hub only needs prefix reads for sniffing, full reads for re-encoding
//! and overwriting puts. Deletion belongs to the external collector that
//! drains `blob_pending_deletes`.

mod s3;

pub use s3::S3BlobStore;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("blob {0} not found")]
    NotFound(String),

    #[error("blob I/O failed: {0}")]
    Io(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// At most the first `n` bytes of the blob
    async fn read_prefix(&self, key: &str, n: usize) -> Result<Bytes, BlobError>;

    async fn read_all(&self, key: &str) -> Result<Bytes, BlobError>;

    /// Create or overwrite `key`
    async fn put(&self, key: &str, data: Bytes, mime_type: &str) -> Result<(), BlobError>;
}
