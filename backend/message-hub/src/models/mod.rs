/// Data models for message-hub
use chrono::{DateTime, DurationRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Root message or comment
///
/// `likes` and `liked_by_me` are read-side projections relative to the viewer
/// of the query; they are ignored on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub user_id: String,
    pub user_name: String,
    pub text: String,
    pub attachment_id: String,
    pub attachment_type: String,
    pub attachment_thumbnail_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(default)]
    pub likes: i64,
    #[sqlx(default)]
    pub liked_by_me: bool,
}

impl Message {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_comment(&self) -> bool {
        self.parent_id.is_some()
    }

    /// New row with no attachment; timestamps both set to `now`
    pub fn new(
        id: Uuid,
        parent_id: Option<Uuid>,
        author: &Identity,
        text: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            parent_id,
            user_id: author.id.clone(),
            user_name: author.name.clone(),
            text: text.into(),
            attachment_id: String::new(),
            attachment_type: String::new(),
            attachment_thumbnail_id: String::new(),
            created_at: now,
            updated_at: now,
            likes: 0,
            liked_by_me: false,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment_id = attachment.id;
        self.attachment_type = attachment.mime_type;
        self.attachment_thumbnail_id = attachment.thumbnail_id;
        self
    }

    /// Blob keys referenced by this row (may contain empty strings)
    pub fn blob_refs(&self) -> BlobRefs<'_> {
        BlobRefs {
            attachment_id: &self.attachment_id,
            thumbnail_id: &self.attachment_thumbnail_id,
        }
    }
}

/// Attachment columns written together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    pub mime_type: String,
    pub thumbnail_id: String,
}

impl Attachment {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn blob_refs(&self) -> BlobRefs<'_> {
        BlobRefs {
            attachment_id: &self.id,
            thumbnail_id: &self.thumbnail_id,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BlobRefs<'a> {
    pub attachment_id: &'a str,
    pub thumbnail_id: &'a str,
}

/// Like with the liker's display name joined in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageLike {
    pub message_id: Uuid,
    pub user_id: String,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
}

/// Caller identity as established by the outer layer or a verified token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Entry of the hub's user directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HubUser {
    pub id: String,
    pub name: String,
}

/// Row of the pending blob delete queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PendingBlobDelete {
    pub blob_id: String,
    pub enqueued_at: DateTime<Utc>,
}

/// Root message with its likers and comments, as returned to readers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageThread {
    pub message: Message,
    pub liked_by: Vec<MessageLike>,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub comment: Message,
    pub liked_by: Vec<MessageLike>,
}

/// Upper bound used when a listing has no cursor
pub fn max_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Current time truncated to microseconds, the precision Postgres stores
pub fn current_timestamp() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(chrono::Duration::microseconds(1))
        .unwrap_or(now)
}
