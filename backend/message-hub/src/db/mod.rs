/// Database access layer for message-hub
///
/// `MessageRepository` is the seam the service talks to. The Postgres
/// implementation lives in `message_repo`; tests substitute an in-memory one.
pub mod blob_gc;
pub mod message_repo;

pub use message_repo::PgMessageRepository;

use crate::error::ServiceResult;
use crate::models::{Attachment, HubUser, Identity, Message, MessageLike, PendingBlobDelete};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Listing size used when the caller passes zero or a negative count
pub const DEFAULT_MESSAGE_COUNT: i64 = 10;

pub fn effective_limit(limit: i64) -> i64 {
    if limit <= 0 {
        DEFAULT_MESSAGE_COUNT
    } else {
        limit
    }
}

#[async_trait::async_trait]
pub trait MessageRepository: Send + Sync {
    /// Record or refresh a user's display name in the hub directory
    async fn upsert_user(&self, user: &Identity, now: DateTime<Utc>) -> ServiceResult<()>;

    /// Users whose name matches any of `names`, ignoring case
    async fn find_users_by_name(&self, names: &[String]) -> ServiceResult<Vec<HubUser>>;

    /// Insert `message`; a second insert with the same id is a no-op
    ///
    /// Comments require an existing root parent. Returns whether a row was
    /// written.
    async fn create_message(&self, message: &Message) -> ServiceResult<bool>;

    /// Single message by id, visibility overrides not applied
    async fn message(&self, viewer_id: &str, id: Uuid) -> ServiceResult<Message>;

    /// Roots by `author_ids` older than `before`, newest first
    async fn messages(
        &self,
        viewer_id: &str,
        author_ids: &[String],
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> ServiceResult<Vec<Message>>;

    /// Comments of each root, oldest first
    async fn comments(
        &self,
        viewer_id: &str,
        root_ids: &[Uuid],
    ) -> ServiceResult<HashMap<Uuid, Vec<Message>>>;

    async fn edit_message_text(
        &self,
        author_id: &str,
        id: Uuid,
        text: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<()>;

    /// Replace the attachment columns and queue blobs the row stops referencing
    async fn edit_message_attachment(
        &self,
        author_id: &str,
        id: Uuid,
        attachment: &Attachment,
        now: DateTime<Utc>,
    ) -> ServiceResult<()>;

    /// Delete a message; roots take their comments, likes and overrides along
    async fn delete_message(&self, author_id: &str, id: Uuid, now: DateTime<Utc>)
        -> ServiceResult<()>;

    /// Idempotent like; returns the resulting like count
    async fn like_message(&self, user_id: &str, id: Uuid, now: DateTime<Utc>)
        -> ServiceResult<i64>;

    async fn messages_likes(&self, ids: &[Uuid]) -> ServiceResult<HashMap<Uuid, Vec<MessageLike>>>;

    async fn message_likes(&self, id: Uuid) -> ServiceResult<Vec<MessageLike>> {
        let mut likes = self.messages_likes(&[id]).await?;
        Ok(likes.remove(&id).unwrap_or_default())
    }

    async fn set_message_visibility(
        &self,
        user_id: &str,
        id: Uuid,
        visible: bool,
        now: DateTime<Utc>,
    ) -> ServiceResult<()>;

    /// Oldest queued blob deletes, for the collector
    async fn pending_blob_deletes(&self, limit: i64) -> ServiceResult<Vec<PendingBlobDelete>>;
}
