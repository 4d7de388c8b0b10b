//! Attachment derivation
//!
//! Given the storage key of an uploaded attachment, works out its MIME type,
//! a thumbnail key, and rewrites rotated JPEGs upright. Every step is best
//! effort: failures are logged and degrade to "no thumbnail" or "left as is",
//! never to an error for the caller.

use super::frames::FrameExtractor;
use super::orientation::normalize_jpeg;
use super::sniff::{is_image, is_video, sniff_mime_type, SNIFF_LEN};
use crate::models::Attachment;
use crate::storage::BlobStore;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

const THUMBNAIL_SUFFIX: &str = "-thumbnail.jpg";
const JPEG_MIME: &str = "image/jpeg";

/// Storage key of the frame extracted from video `attachment_id`
///
/// The full id is kept, so `clip.mp4` and `clip.mov` get distinct keys:
/// `videos/clip.mp4` becomes `videos/clip.mp4-thumbnail.jpg`.
pub fn thumbnail_key(attachment_id: &str) -> String {
    format!("{attachment_id}{THUMBNAIL_SUFFIX}")
}

pub struct AttachmentProcessor {
    store: Arc<dyn BlobStore>,
    frames: Arc<dyn FrameExtractor>,
    jpeg_quality: u8,
}

impl AttachmentProcessor {
    pub fn new(store: Arc<dyn BlobStore>, frames: Arc<dyn FrameExtractor>, jpeg_quality: u8) -> Self {
        Self {
            store,
            frames,
            jpeg_quality,
        }
    }

    /// Attachment columns for `attachment_id`; empty id means no attachment
    pub async fn derive(&self, attachment_id: &str) -> Attachment {
        if attachment_id.is_empty() {
            return Attachment::none();
        }

        let prefix = match self.store.read_prefix(attachment_id, SNIFF_LEN).await {
            Ok(prefix) => prefix,
            Err(err) => {
                warn!(attachment_id, error = %err, "attachment unreadable, stored without type");
                return Attachment {
                    id: attachment_id.to_string(),
                    ..Attachment::default()
                };
            }
        };

        let mime_type = sniff_mime_type(&prefix);
        let thumbnail_id = if is_image(mime_type) {
            attachment_id.to_string()
        } else if is_video(mime_type) {
            self.video_thumbnail(attachment_id).await
        } else {
            String::new()
        };

        if mime_type == JPEG_MIME {
            self.normalize_orientation(attachment_id).await;
        }

        debug!(attachment_id, mime_type, %thumbnail_id, "attachment derived");
        Attachment {
            id: attachment_id.to_string(),
            mime_type: mime_type.to_string(),
            thumbnail_id,
        }
    }

    async fn video_thumbnail(&self, attachment_id: &str) -> String {
        let video = match self.store.read_all(attachment_id).await {
            Ok(video) => video,
            Err(err) => {
                warn!(attachment_id, error = %err, "failed to read video");
                return String::new();
            }
        };

        let frame = match self.frames.extract_frame(video).await {
            Ok(frame) if !frame.is_empty() => frame,
            Ok(_) => {
                debug!(attachment_id, "no frame extracted from video");
                return String::new();
            }
            Err(err) => {
                warn!(attachment_id, error = %err, "video frame extraction failed");
                return String::new();
            }
        };

        let key = thumbnail_key(attachment_id);
        match self.store.put(&key, frame, JPEG_MIME).await {
            Ok(()) => key,
            Err(err) => {
                warn!(attachment_id, thumbnail_id = %key, error = %err, "failed to store video thumbnail");
                String::new()
            }
        }
    }

    async fn normalize_orientation(&self, attachment_id: &str) {
        let original = match self.store.read_all(attachment_id).await {
            Ok(data) => data,
            Err(err) => {
                warn!(attachment_id, error = %err, "failed to read JPEG for orientation");
                return;
            }
        };

        let quality = self.jpeg_quality;
        let fixed = tokio::task::spawn_blocking(move || normalize_jpeg(&original, quality)).await;

        let fixed = match fixed {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => return,
            Ok(Err(err)) => {
                warn!(attachment_id, error = %err, "JPEG orientation fix failed");
                return;
            }
            Err(err) => {
                warn!(attachment_id, error = %err, "JPEG orientation task panicked");
                return;
            }
        };

        if let Err(err) = self.store.put(attachment_id, Bytes::from(fixed), JPEG_MIME).await {
            warn!(attachment_id, error = %err, "failed to store upright JPEG");
        }
    }
}
