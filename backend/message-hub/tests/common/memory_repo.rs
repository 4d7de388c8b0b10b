//! In-memory MessageRepository
//!
//! Mirrors the Postgres repository: same ordering, visibility filtering,
//! cascade and pending blob delete bookkeeping.

use chrono::{DateTime, Utc};
use message_hub::db::blob_gc::{cascade_blobs, orphaned_blobs};
use message_hub::db::{effective_limit, MessageRepository};
use message_hub::error::{ServiceError, ServiceResult};
use message_hub::models::{
    Attachment, HubUser, Identity, Message, MessageLike, PendingBlobDelete,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    users: BTreeMap<String, String>,
    messages: HashMap<Uuid, Message>,
    likes: BTreeMap<(Uuid, String), DateTime<Utc>>,
    hidden: HashSet<(String, Uuid)>,
    pending: Vec<PendingBlobDelete>,
}

impl State {
    fn project(&self, viewer_id: &str, message: &Message) -> Message {
        let mut out = message.clone();
        out.likes = self.likes.keys().filter(|(id, _)| *id == message.id).count() as i64;
        out.liked_by_me = self
            .likes
            .contains_key(&(message.id, viewer_id.to_string()));
        out
    }

    fn is_hidden(&self, viewer_id: &str, id: Uuid) -> bool {
        self.hidden.contains(&(viewer_id.to_string(), id))
    }

    fn enqueue(&mut self, blob_ids: Vec<String>, now: DateTime<Utc>) {
        self.pending.extend(blob_ids.into_iter().map(|blob_id| PendingBlobDelete {
            blob_id,
            enqueued_at: now,
        }));
    }

    fn owned(&self, author_id: &str, id: Uuid) -> ServiceResult<&Message> {
        self.messages
            .get(&id)
            .filter(|m| m.user_id == author_id)
            .ok_or_else(|| ServiceError::NotFound(format!("message {id} not found")))
    }
}

#[derive(Default)]
pub struct MemoryMessageRepository {
    state: Mutex<State>,
}

impl MemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored row without projections, if any
    pub fn stored(&self, id: Uuid) -> Option<Message> {
        self.state.lock().unwrap().messages.get(&id).cloned()
    }

    pub fn message_count(&self) -> usize {
        self.state.lock().unwrap().messages.len()
    }

    pub fn like_rows(&self) -> usize {
        self.state.lock().unwrap().likes.len()
    }

    pub fn visibility_rows(&self) -> usize {
        self.state.lock().unwrap().hidden.len()
    }

    pub fn pending_blob_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .pending
            .iter()
            .map(|p| p.blob_id.clone())
            .collect()
    }

    pub fn user_name(&self, id: &str) -> Option<String> {
        self.state.lock().unwrap().users.get(id).cloned()
    }
}

#[async_trait::async_trait]
impl MessageRepository for MemoryMessageRepository {
    async fn upsert_user(&self, user: &Identity, _now: DateTime<Utc>) -> ServiceResult<()> {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(user.id.clone(), user.name.clone());
        Ok(())
    }

    async fn find_users_by_name(&self, names: &[String]) -> ServiceResult<Vec<HubUser>> {
        let wanted: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .filter(|(_, name)| wanted.contains(&name.to_lowercase()))
            .map(|(id, name)| HubUser {
                id: id.clone(),
                name: name.clone(),
            })
            .collect())
    }

    async fn create_message(&self, message: &Message) -> ServiceResult<bool> {
        let mut state = self.state.lock().unwrap();

        if let Some(parent_id) = message.parent_id {
            match state.messages.get(&parent_id) {
                None => {
                    return Err(ServiceError::NotFound(format!(
                        "message {parent_id} not found"
                    )))
                }
                Some(parent) if parent.is_comment() => {
                    return Err(ServiceError::InvalidArgument(format!(
                        "message {parent_id} is a comment"
                    )))
                }
                Some(_) => {}
            }
        }

        if state.messages.contains_key(&message.id) {
            return Ok(false);
        }
        let mut row = message.clone();
        row.likes = 0;
        row.liked_by_me = false;
        state.messages.insert(message.id, row);
        Ok(true)
    }

    async fn message(&self, viewer_id: &str, id: Uuid) -> ServiceResult<Message> {
        let state = self.state.lock().unwrap();
        state
            .messages
            .get(&id)
            .map(|m| state.project(viewer_id, m))
            .ok_or_else(|| ServiceError::NotFound(format!("message {id} not found")))
    }

    async fn messages(
        &self,
        viewer_id: &str,
        author_ids: &[String],
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> ServiceResult<Vec<Message>> {
        let state = self.state.lock().unwrap();
        let mut roots: Vec<&Message> = state
            .messages
            .values()
            .filter(|m| m.is_root())
            .filter(|m| author_ids.contains(&m.user_id))
            .filter(|m| before.map_or(true, |b| m.created_at < b))
            .filter(|m| !state.is_hidden(viewer_id, m.id))
            .collect();
        roots.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        Ok(roots
            .into_iter()
            .take(effective_limit(limit) as usize)
            .map(|m| state.project(viewer_id, m))
            .collect())
    }

    async fn comments(
        &self,
        viewer_id: &str,
        root_ids: &[Uuid],
    ) -> ServiceResult<HashMap<Uuid, Vec<Message>>> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<&Message> = state
            .messages
            .values()
            .filter(|m| m.parent_id.map_or(false, |p| root_ids.contains(&p)))
            .filter(|m| !state.is_hidden(viewer_id, m.id))
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let mut grouped: HashMap<Uuid, Vec<Message>> = HashMap::new();
        for comment in rows {
            if let Some(parent_id) = comment.parent_id {
                grouped
                    .entry(parent_id)
                    .or_default()
                    .push(state.project(viewer_id, comment));
            }
        }
        Ok(grouped)
    }

    async fn edit_message_text(
        &self,
        author_id: &str,
        id: Uuid,
        text: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut state = self.state.lock().unwrap();
        state.owned(author_id, id)?;
        if let Some(row) = state.messages.get_mut(&id) {
            row.text = text.to_string();
            row.updated_at = now;
        }
        Ok(())
    }

    async fn edit_message_attachment(
        &self,
        author_id: &str,
        id: Uuid,
        attachment: &Attachment,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut state = self.state.lock().unwrap();
        let current = state.owned(author_id, id)?.clone();
        let orphaned = orphaned_blobs(current.blob_refs(), attachment.blob_refs());
        state.enqueue(orphaned, now);

        if let Some(row) = state.messages.get_mut(&id) {
            row.attachment_id = attachment.id.clone();
            row.attachment_type = attachment.mime_type.clone();
            row.attachment_thumbnail_id = attachment.thumbnail_id.clone();
            row.updated_at = now;
        }
        Ok(())
    }

    async fn delete_message(
        &self,
        author_id: &str,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut state = self.state.lock().unwrap();
        let target = state.owned(author_id, id)?.clone();

        let comments: Vec<Message> = if target.is_root() {
            state
                .messages
                .values()
                .filter(|m| m.parent_id == Some(id))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        let blobs = cascade_blobs(
            std::iter::once(target.blob_refs()).chain(comments.iter().map(Message::blob_refs)),
        );
        state.enqueue(blobs, now);

        let ids: HashSet<Uuid> = std::iter::once(id).chain(comments.iter().map(|c| c.id)).collect();
        state.likes.retain(|(message_id, _), _| !ids.contains(message_id));
        state.hidden.retain(|(_, message_id)| !ids.contains(message_id));
        state.messages.retain(|message_id, _| !ids.contains(message_id));
        Ok(())
    }

    async fn like_message(
        &self,
        user_id: &str,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> ServiceResult<i64> {
        let mut state = self.state.lock().unwrap();
        if !state.messages.contains_key(&id) {
            return Err(ServiceError::NotFound(format!("message {id} not found")));
        }
        state.likes.entry((id, user_id.to_string())).or_insert(now);
        Ok(state.likes.keys().filter(|(m, _)| *m == id).count() as i64)
    }

    async fn messages_likes(
        &self,
        ids: &[Uuid],
    ) -> ServiceResult<HashMap<Uuid, Vec<MessageLike>>> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<MessageLike> = state
            .likes
            .iter()
            .filter(|((message_id, _), _)| ids.contains(message_id))
            .map(|((message_id, user_id), created_at)| MessageLike {
                message_id: *message_id,
                user_id: user_id.clone(),
                user_name: state
                    .users
                    .get(user_id)
                    .cloned()
                    .unwrap_or_else(|| user_id.clone()),
                created_at: *created_at,
            })
            .collect();
        rows.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.user_id.cmp(&b.user_id))
        });

        let mut grouped: HashMap<Uuid, Vec<MessageLike>> = HashMap::new();
        for like in rows {
            grouped.entry(like.message_id).or_default().push(like);
        }
        Ok(grouped)
    }

    async fn set_message_visibility(
        &self,
        user_id: &str,
        id: Uuid,
        visible: bool,
        _now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut state = self.state.lock().unwrap();
        let key = (user_id.to_string(), id);
        if visible {
            state.hidden.remove(&key);
            return Ok(());
        }
        if !state.messages.contains_key(&id) {
            return Err(ServiceError::NotFound(format!("message {id} not found")));
        }
        state.hidden.insert(key);
        Ok(())
    }

    async fn pending_blob_deletes(&self, limit: i64) -> ServiceResult<Vec<PendingBlobDelete>> {
        let state = self.state.lock().unwrap();
        Ok(state.pending.iter().take(limit.max(0) as usize).cloned().collect())
    }
}
