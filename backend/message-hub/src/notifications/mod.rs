//! Notification fan-out
//!
//! Delivery itself (push, email) happens elsewhere. The hub hands each
//! notification to a [`NotificationSender`] on a background task and never
//! waits for, retries, or reports the outcome.

mod http;

pub use http::HttpNotificationSender;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    #[serde(rename = "message/post")]
    MessagePost,
    #[serde(rename = "message/tag")]
    MessageTag,
    #[serde(rename = "message/like")]
    MessageLike,
    #[serde(rename = "comment/post")]
    CommentPost,
    #[serde(rename = "comment/tag")]
    CommentTag,
    #[serde(rename = "comment/like")]
    CommentLike,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::MessagePost => "message/post",
            NotificationKind::MessageTag => "message/tag",
            NotificationKind::MessageLike => "message/like",
            NotificationKind::CommentPost => "comment/post",
            NotificationKind::CommentTag => "comment/tag",
            NotificationKind::CommentLike => "comment/like",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// User who caused the notification
    pub user_id: String,
    /// Root message the notification is about
    pub message_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipients: Vec<String>,
    pub text: String,
    pub kind: NotificationKind,
    pub payload: NotificationPayload,
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: Notification) -> anyhow::Result<()>;
}

/// Sender used when no delivery channel is configured
pub struct NoopNotificationSender;

#[async_trait]
impl NotificationSender for NoopNotificationSender {
    async fn send(&self, notification: Notification) -> anyhow::Result<()> {
        debug!(
            kind = notification.kind.as_str(),
            recipients = notification.recipients.len(),
            "notification delivery disabled, dropping"
        );
        Ok(())
    }
}

/// Fire-and-forget dispatcher in front of a [`NotificationSender`]
#[derive(Clone)]
pub struct NotificationFanout {
    sender: Arc<dyn NotificationSender>,
}

impl NotificationFanout {
    pub fn new(sender: Arc<dyn NotificationSender>) -> Self {
        Self { sender }
    }

    /// Send `notification` in the background; empty recipient lists are dropped
    pub fn dispatch(&self, notification: Notification) {
        if notification.recipients.is_empty() {
            return;
        }

        let sender = self.sender.clone();
        tokio::spawn(async move {
            let kind = notification.kind.as_str();
            let message_id = notification.payload.message_id;
            let recipients = notification.recipients.len();

            match sender.send(notification).await {
                Ok(()) => debug!(kind, %message_id, recipients, "notification sent"),
                Err(err) => warn!(kind, %message_id, recipients, error = %err, "notification failed"),
            }
        });
    }
}
