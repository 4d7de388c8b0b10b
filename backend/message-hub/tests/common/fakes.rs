//! Test doubles for the blob store, frame extractor and notification sender

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use message_hub::notifications::{Notification, NotificationKind, NotificationSender};
use message_hub::services::FrameExtractor;
use message_hub::storage::{BlobError, BlobStore};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Blob store keeping objects in a map
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, (Bytes, String)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, data: impl Into<Bytes>) {
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), (data.into(), String::new()));
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.blobs.lock().unwrap().get(key).map(|(data, _)| data.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.blobs
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, mime)| mime.clone())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read_prefix(&self, key: &str, n: usize) -> Result<Bytes, BlobError> {
        let data = self.read_all(key).await?;
        Ok(data.slice(..n.min(data.len())))
    }

    async fn read_all(&self, key: &str) -> Result<Bytes, BlobError> {
        self.get(key)
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, data: Bytes, mime_type: &str) -> Result<(), BlobError> {
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, mime_type.to_string()));
        Ok(())
    }
}

/// Frame extractor returning fixed bytes, or failing when built with `failing`
pub struct StaticFrameExtractor {
    frame: Option<Bytes>,
    calls: Mutex<usize>,
}

impl StaticFrameExtractor {
    pub fn returning(frame: impl Into<Bytes>) -> Self {
        Self {
            frame: Some(frame.into()),
            calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            frame: None,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl FrameExtractor for StaticFrameExtractor {
    async fn extract_frame(&self, _video: Bytes) -> anyhow::Result<Bytes> {
        *self.calls.lock().unwrap() += 1;
        self.frame
            .clone()
            .ok_or_else(|| anyhow!("ffmpeg exited with status 1"))
    }
}

/// Notification sender recording everything it is handed
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn of_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.kind == kind)
            .collect()
    }

    /// Wait until at least `count` notifications arrived, or two seconds passed
    pub async fn wait_for(&self, count: usize) -> Vec<Notification> {
        for _ in 0..200 {
            if self.sent.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent()
    }

    /// Let spawned fan-out tasks run, for asserting that nothing was sent
    pub async fn settle(&self) -> Vec<Notification> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.sent()
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn send(&self, notification: Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}
