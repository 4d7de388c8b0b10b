/// Message service - post, read, edit, delete, like and hide messages and comments
use super::attachments::AttachmentProcessor;
use super::mention_parser::extract_mentions;
use crate::capability::{CapabilityAction, CapabilityVerifier};
use crate::db::MessageRepository;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    current_timestamp, CommentView, Identity, Message, MessageLike, MessageThread,
};
use crate::notifications::{
    Notification, NotificationFanout, NotificationKind, NotificationPayload,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Content of a new message or comment
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    /// Client-chosen id for safe retries; generated when absent
    pub id: Option<Uuid>,
    pub text: String,
    /// Storage key of an uploaded attachment, empty for none
    pub attachment_id: String,
}

/// Fields to change on an existing message; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct MessageEdit {
    pub text: Option<String>,
    pub attachment_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Message,
    Comment,
}

impl Kind {
    fn of(message: &Message) -> Self {
        if message.is_root() {
            Kind::Message
        } else {
            Kind::Comment
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Kind::Message => "message",
            Kind::Comment => "comment",
        }
    }
}

pub struct MessageService {
    repo: Arc<dyn MessageRepository>,
    attachments: AttachmentProcessor,
    verifier: CapabilityVerifier,
    notifications: NotificationFanout,
}

impl MessageService {
    pub fn new(
        repo: Arc<dyn MessageRepository>,
        attachments: AttachmentProcessor,
        verifier: CapabilityVerifier,
        notifications: NotificationFanout,
    ) -> Self {
        Self {
            repo,
            attachments,
            verifier,
            notifications,
        }
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// Post a root message on behalf of the token's subject
    pub async fn post_message(
        &self,
        caller: &Identity,
        token: &str,
        input: NewMessage,
    ) -> ServiceResult<Message> {
        let capability = self
            .verifier
            .verify(token, CapabilityAction::PostMessage, caller)?;
        let author = capability.identity.clone();
        let now = current_timestamp();
        self.repo.upsert_user(&author, now).await?;

        let id = input.id.unwrap_or_else(Uuid::new_v4);
        if let Some(existing) = self.find_retry(&author, id, None).await? {
            return Ok(existing);
        }

        let attachment = self.attachments.derive(&input.attachment_id).await;
        let message = Message::new(id, None, &author, input.text, now).with_attachment(attachment);
        let created = self.repo.create_message(&message).await?;
        let stored = self.stored_retry(&author, id, None).await?;

        if created {
            info!(message_id = %id, user_id = %author.id, "message posted");

            let recipients: Vec<String> = capability
                .scope_ids()
                .into_iter()
                .filter(|user_id| user_id != &author.id)
                .collect();
            self.notifications.dispatch(Notification {
                recipients,
                text: format!("{} posted a new message", author.name),
                kind: NotificationKind::MessagePost,
                payload: NotificationPayload {
                    user_id: author.id.clone(),
                    message_id: id,
                    comment_id: None,
                },
            });

            self.notify_tagged(
                &author,
                &stored.text,
                format!("{} tagged you in a message", author.name),
                NotificationKind::MessageTag,
                NotificationPayload {
                    user_id: author.id.clone(),
                    message_id: id,
                    comment_id: None,
                },
            )
            .await;
        }

        Ok(stored)
    }

    /// One root message with its likers and comments
    ///
    /// Only roots are served. A comment id is `NotFound` even when its author
    /// is in scope; comments are read through their root's thread.
    pub async fn get_message(
        &self,
        caller: &Identity,
        token: &str,
        id: Uuid,
    ) -> ServiceResult<MessageThread> {
        let capability = self
            .verifier
            .verify(token, CapabilityAction::GetMessages, caller)?;
        self.repo
            .upsert_user(&capability.identity, current_timestamp())
            .await?;

        let message = self.repo.message(&caller.id, id).await?;
        if !message.is_root() || !capability.in_scope(&message.user_id) {
            return Err(ServiceError::message_not_found(id));
        }

        let mut threads = self.threads(&caller.id, vec![message]).await?;
        threads.pop().ok_or_else(|| ServiceError::message_not_found(id))
    }

    /// Feed of root messages by the token's counter-party users
    ///
    /// `from` is an exclusive upper bound on `created_at`; pass the oldest
    /// timestamp of the previous page to continue.
    pub async fn list_messages(
        &self,
        caller: &Identity,
        token: &str,
        from: Option<DateTime<Utc>>,
        count: i64,
    ) -> ServiceResult<Vec<MessageThread>> {
        let capability = self
            .verifier
            .verify(token, CapabilityAction::GetMessages, caller)?;
        self.repo
            .upsert_user(&capability.identity, current_timestamp())
            .await?;

        let roots = self
            .repo
            .messages(&caller.id, &capability.scope_ids(), from, count)
            .await?;
        self.threads(&caller.id, roots).await
    }

    pub async fn edit_message(
        &self,
        caller: &Identity,
        id: Uuid,
        edit: MessageEdit,
    ) -> ServiceResult<Message> {
        self.edit(caller, id, Kind::Message, edit).await
    }

    pub async fn delete_message(&self, caller: &Identity, id: Uuid) -> ServiceResult<()> {
        self.delete(caller, id, Kind::Message).await
    }

    /// Like a root message; returns the new like count
    pub async fn like_message(&self, caller: &Identity, id: Uuid) -> ServiceResult<i64> {
        self.like(caller, id, Kind::Message).await
    }

    pub async fn message_likes(&self, id: Uuid) -> ServiceResult<Vec<MessageLike>> {
        self.repo.message_likes(id).await
    }

    pub async fn set_message_visibility(
        &self,
        caller: &Identity,
        id: Uuid,
        visible: bool,
    ) -> ServiceResult<()> {
        self.set_visibility(caller, id, Kind::Message, visible).await
    }

    // ========================================================================
    // Comments
    // ========================================================================

    /// Comment on a root message authored by one of the token's counter-parties
    pub async fn post_comment(
        &self,
        caller: &Identity,
        token: &str,
        message_id: Uuid,
        input: NewMessage,
    ) -> ServiceResult<Message> {
        let capability = self
            .verifier
            .verify(token, CapabilityAction::GetMessages, caller)?;
        let author = capability.identity.clone();
        let now = current_timestamp();
        self.repo.upsert_user(&author, now).await?;

        let root = self.repo.message(&author.id, message_id).await?;
        if !root.is_root() {
            return Err(ServiceError::InvalidArgument(format!(
                "{message_id} is not a message"
            )));
        }
        if !capability.in_scope(&root.user_id) {
            return Err(ServiceError::message_not_found(message_id));
        }

        let id = input.id.unwrap_or_else(Uuid::new_v4);
        if let Some(existing) = self.find_retry(&author, id, Some(message_id)).await? {
            return Ok(existing);
        }

        let attachment = self.attachments.derive(&input.attachment_id).await;
        let comment = Message::new(id, Some(message_id), &author, input.text, now)
            .with_attachment(attachment);
        let created = self.repo.create_message(&comment).await?;
        let stored = self.stored_retry(&author, id, Some(message_id)).await?;

        if created {
            info!(%message_id, comment_id = %id, user_id = %author.id, "comment posted");

            let payload = NotificationPayload {
                user_id: author.id.clone(),
                message_id,
                comment_id: Some(id),
            };
            if root.user_id != author.id {
                self.notifications.dispatch(Notification {
                    recipients: vec![root.user_id.clone()],
                    text: format!("{} posted a new comment", author.name),
                    kind: NotificationKind::CommentPost,
                    payload: payload.clone(),
                });
            }

            self.notify_tagged(
                &author,
                &stored.text,
                format!("{} tagged you in a comment", author.name),
                NotificationKind::CommentTag,
                payload,
            )
            .await;
        }

        Ok(stored)
    }

    pub async fn edit_comment(
        &self,
        caller: &Identity,
        id: Uuid,
        edit: MessageEdit,
    ) -> ServiceResult<Message> {
        self.edit(caller, id, Kind::Comment, edit).await
    }

    pub async fn delete_comment(&self, caller: &Identity, id: Uuid) -> ServiceResult<()> {
        self.delete(caller, id, Kind::Comment).await
    }

    /// Like a comment; returns the new like count
    pub async fn like_comment(&self, caller: &Identity, id: Uuid) -> ServiceResult<i64> {
        self.like(caller, id, Kind::Comment).await
    }

    pub async fn comment_likes(&self, id: Uuid) -> ServiceResult<Vec<MessageLike>> {
        self.repo.message_likes(id).await
    }

    pub async fn set_comment_visibility(
        &self,
        caller: &Identity,
        id: Uuid,
        visible: bool,
    ) -> ServiceResult<()> {
        self.set_visibility(caller, id, Kind::Comment, visible).await
    }

    // ========================================================================
    // Shared steps
    // ========================================================================

    /// Message `id` owned by `caller` with the expected kind, else NotFound
    async fn owned(&self, caller: &Identity, id: Uuid, kind: Kind) -> ServiceResult<Message> {
        let message = self.repo.message(&caller.id, id).await?;
        if message.user_id != caller.id || Kind::of(&message) != kind {
            return Err(ServiceError::NotFound(format!("{} {id} not found", kind.noun())));
        }
        Ok(message)
    }

    /// Existing message `id` with the expected kind; wrong kind is InvalidArgument
    async fn target(&self, caller: &Identity, id: Uuid, kind: Kind) -> ServiceResult<Message> {
        let message = self.repo.message(&caller.id, id).await?;
        if Kind::of(&message) != kind {
            return Err(ServiceError::InvalidArgument(format!(
                "{id} is not a {}",
                kind.noun()
            )));
        }
        Ok(message)
    }

    async fn edit(
        &self,
        caller: &Identity,
        id: Uuid,
        kind: Kind,
        edit: MessageEdit,
    ) -> ServiceResult<Message> {
        let current = self.owned(caller, id, kind).await?;
        let now = current_timestamp();

        if let Some(text) = edit.text.as_deref() {
            self.repo.edit_message_text(&caller.id, id, text, now).await?;
        }

        if let Some(attachment_id) = edit.attachment_id.as_deref() {
            if attachment_id != current.attachment_id {
                let attachment = self.attachments.derive(attachment_id).await;
                self.repo
                    .edit_message_attachment(&caller.id, id, &attachment, now)
                    .await?;
            }
        }

        debug!(message_id = %id, kind = kind.noun(), "message edited");
        self.repo.message(&caller.id, id).await
    }

    async fn delete(&self, caller: &Identity, id: Uuid, kind: Kind) -> ServiceResult<()> {
        self.owned(caller, id, kind).await?;
        self.repo
            .delete_message(&caller.id, id, current_timestamp())
            .await?;

        info!(message_id = %id, kind = kind.noun(), user_id = %caller.id, "message deleted");
        Ok(())
    }

    async fn like(&self, caller: &Identity, id: Uuid, kind: Kind) -> ServiceResult<i64> {
        let target = self.target(caller, id, kind).await?;
        let now = current_timestamp();
        self.repo.upsert_user(caller, now).await?;
        let likes = self.repo.like_message(&caller.id, id, now).await?;

        if !target.liked_by_me && target.user_id != caller.id {
            let (notification_kind, text, payload) = match kind {
                Kind::Message => (
                    NotificationKind::MessageLike,
                    format!("{} liked your post", caller.name),
                    NotificationPayload {
                        user_id: caller.id.clone(),
                        message_id: id,
                        comment_id: None,
                    },
                ),
                Kind::Comment => (
                    NotificationKind::CommentLike,
                    format!("{} liked your comment", caller.name),
                    NotificationPayload {
                        user_id: caller.id.clone(),
                        message_id: target.parent_id.unwrap_or(id),
                        comment_id: Some(id),
                    },
                ),
            };
            self.notifications.dispatch(Notification {
                recipients: vec![target.user_id.clone()],
                text,
                kind: notification_kind,
                payload,
            });
        }

        Ok(likes)
    }

    async fn set_visibility(
        &self,
        caller: &Identity,
        id: Uuid,
        kind: Kind,
        visible: bool,
    ) -> ServiceResult<()> {
        self.target(caller, id, kind).await?;
        self.repo
            .set_message_visibility(&caller.id, id, visible, current_timestamp())
            .await?;

        debug!(message_id = %id, user_id = %caller.id, visible, "visibility set");
        Ok(())
    }

    /// Message already stored under `id` when a post is being retried
    async fn find_retry(
        &self,
        author: &Identity,
        id: Uuid,
        parent_id: Option<Uuid>,
    ) -> ServiceResult<Option<Message>> {
        match self.repo.message(&author.id, id).await {
            Ok(existing) => {
                ensure_same_post(&existing, author, parent_id)?;
                debug!(message_id = %id, "retried post, returning stored message");
                Ok(Some(existing))
            }
            Err(ServiceError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Row stored under `id` after an insert, which may have been a no-op
    async fn stored_retry(
        &self,
        author: &Identity,
        id: Uuid,
        parent_id: Option<Uuid>,
    ) -> ServiceResult<Message> {
        let stored = self.repo.message(&author.id, id).await?;
        ensure_same_post(&stored, author, parent_id)?;
        Ok(stored)
    }

    /// Notify users @mentioned in `text`, except the author
    ///
    /// Runs after the write has committed, so lookup failures are only logged.
    async fn notify_tagged(
        &self,
        author: &Identity,
        text: &str,
        summary: String,
        kind: NotificationKind,
        payload: NotificationPayload,
    ) {
        let names = extract_mentions(text);
        if names.is_empty() {
            return;
        }

        let users = match self.repo.find_users_by_name(&names).await {
            Ok(users) => users,
            Err(err) => {
                warn!(kind = kind.as_str(), error = %err, "failed to resolve tagged users");
                return;
            }
        };

        let mut recipients: Vec<String> = users
            .into_iter()
            .map(|user| user.id)
            .filter(|user_id| user_id != &author.id)
            .collect();
        recipients.sort();
        recipients.dedup();

        self.notifications.dispatch(Notification {
            recipients,
            text: summary,
            kind,
            payload,
        });
    }

    /// Attach likers and comments (with their likers) to each root
    async fn threads(
        &self,
        viewer_id: &str,
        roots: Vec<Message>,
    ) -> ServiceResult<Vec<MessageThread>> {
        let root_ids: Vec<Uuid> = roots.iter().map(|m| m.id).collect();
        let mut comments = self.repo.comments(viewer_id, &root_ids).await?;

        let mut all_ids = root_ids;
        all_ids.extend(comments.values().flatten().map(|c| c.id));
        let mut likes: HashMap<Uuid, Vec<MessageLike>> =
            self.repo.messages_likes(&all_ids).await?;

        let threads = roots
            .into_iter()
            .map(|message| {
                let comments = comments
                    .remove(&message.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|comment| CommentView {
                        liked_by: likes.remove(&comment.id).unwrap_or_default(),
                        comment,
                    })
                    .collect();
                MessageThread {
                    liked_by: likes.remove(&message.id).unwrap_or_default(),
                    message,
                    comments,
                }
            })
            .collect();

        Ok(threads)
    }
}

fn ensure_same_post(
    existing: &Message,
    author: &Identity,
    parent_id: Option<Uuid>,
) -> ServiceResult<()> {
    if existing.user_id != author.id || existing.parent_id != parent_id {
        return Err(ServiceError::AlreadyExists(format!(
            "message {} already exists",
            existing.id
        )));
    }
    Ok(())
}
