use super::blob_gc::{cascade_blobs, orphaned_blobs};
use super::{effective_limit, MessageRepository};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    max_timestamp, Attachment, BlobRefs, HubUser, Identity, Message, MessageLike,
    PendingBlobDelete,
};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Message columns plus the viewer-relative like projections; `$1` is the viewer
const SELECT_MESSAGE: &str = r#"
    SELECT m.id, m.parent_id, m.user_id, m.user_name, m.text,
           m.attachment_id, m.attachment_type, m.attachment_thumbnail_id,
           m.created_at, m.updated_at,
           (SELECT COUNT(*) FROM message_likes l WHERE l.message_id = m.id) AS likes,
           EXISTS(
               SELECT 1 FROM message_likes l
               WHERE l.message_id = m.id AND l.user_id = $1
           ) AS liked_by_me
    FROM messages m
"#;

/// Excludes rows hidden by the viewer in `$1`
const NOT_HIDDEN: &str = r#"
    NOT EXISTS(
        SELECT 1 FROM message_visibility v
        WHERE v.message_id = m.id AND v.user_id = $1 AND v.visibility = FALSE
    )
"#;

const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Attachment columns of a row locked for a cascading change
#[derive(sqlx::FromRow)]
struct BlobRow {
    id: Uuid,
    parent_id: Option<Uuid>,
    attachment_id: String,
    attachment_thumbnail_id: String,
}

impl BlobRow {
    fn refs(&self) -> BlobRefs<'_> {
        BlobRefs {
            attachment_id: &self.attachment_id,
            thumbnail_id: &self.attachment_thumbnail_id,
        }
    }
}

/// Postgres-backed message repository
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn lock_owned(
        tx: &mut Transaction<'_, Postgres>,
        author_id: &str,
        id: Uuid,
    ) -> ServiceResult<BlobRow> {
        sqlx::query_as::<_, BlobRow>(
            r#"
            SELECT id, parent_id, attachment_id, attachment_thumbnail_id
            FROM messages
            WHERE id = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(author_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ServiceError::message_not_found(id))
    }

    async fn enqueue_blob_deletes(
        tx: &mut Transaction<'_, Postgres>,
        blob_ids: &[String],
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        if blob_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO blob_pending_deletes (blob_id, enqueued_at)
            SELECT blob_id, $2 FROM UNNEST($1::text[]) AS t(blob_id)
            "#,
        )
        .bind(blob_ids)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        debug!(count = blob_ids.len(), "queued blob deletes");
        Ok(())
    }
}

fn missing_target_as_not_found(err: sqlx::Error, id: Uuid) -> ServiceError {
    let is_fk_violation = err
        .as_database_error()
        .and_then(|e| e.code())
        .map(|code| code == FOREIGN_KEY_VIOLATION)
        .unwrap_or(false);

    if is_fk_violation {
        ServiceError::message_not_found(id)
    } else {
        ServiceError::Database(err)
    }
}

#[async_trait::async_trait]
impl MessageRepository for PgMessageRepository {
    async fn upsert_user(&self, user: &Identity, now: DateTime<Utc>) -> ServiceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, updated_at = EXCLUDED.updated_at
            WHERE users.name <> EXCLUDED.name
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_users_by_name(&self, names: &[String]) -> ServiceResult<Vec<HubUser>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let lowered: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();

        let users = sqlx::query_as::<_, HubUser>(
            r#"
            SELECT id, name FROM users
            WHERE LOWER(name) = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&lowered)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn create_message(&self, message: &Message) -> ServiceResult<bool> {
        let mut tx = self.pool.begin().await?;

        if let Some(parent_id) = message.parent_id {
            // Shared lock: a concurrent root delete waits for us or we see it gone
            let parent = sqlx::query_scalar::<_, Option<Uuid>>(
                "SELECT parent_id FROM messages WHERE id = $1 FOR SHARE",
            )
            .bind(parent_id)
            .fetch_optional(&mut *tx)
            .await?;

            match parent {
                None => return Err(ServiceError::message_not_found(parent_id)),
                Some(Some(_)) => {
                    return Err(ServiceError::InvalidArgument(format!(
                        "message {parent_id} is a comment"
                    )))
                }
                Some(None) => {}
            }
        }

        let result = sqlx::query(
            r#"
            INSERT INTO messages (
                id, parent_id, user_id, user_name, text,
                attachment_id, attachment_type, attachment_thumbnail_id,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(message.id)
        .bind(message.parent_id)
        .bind(&message.user_id)
        .bind(&message.user_name)
        .bind(&message.text)
        .bind(&message.attachment_id)
        .bind(&message.attachment_type)
        .bind(&message.attachment_thumbnail_id)
        .bind(message.created_at)
        .bind(message.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let created = result.rows_affected() > 0;
        if !created {
            debug!(message_id = %message.id, "message already exists, insert skipped");
        }
        Ok(created)
    }

    async fn message(&self, viewer_id: &str, id: Uuid) -> ServiceResult<Message> {
        let sql = format!("{SELECT_MESSAGE} WHERE m.id = $2");

        sqlx::query_as::<_, Message>(&sql)
            .bind(viewer_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::message_not_found(id))
    }

    async fn messages(
        &self,
        viewer_id: &str,
        author_ids: &[String],
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> ServiceResult<Vec<Message>> {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"{SELECT_MESSAGE}
            WHERE m.parent_id IS NULL
              AND m.user_id = ANY($2)
              AND m.created_at < $3
              AND {NOT_HIDDEN}
            ORDER BY m.created_at DESC, m.id
            LIMIT $4
            "#
        );

        let messages = sqlx::query_as::<_, Message>(&sql)
            .bind(viewer_id)
            .bind(author_ids)
            .bind(before.unwrap_or_else(max_timestamp))
            .bind(effective_limit(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(messages)
    }

    async fn comments(
        &self,
        viewer_id: &str,
        root_ids: &[Uuid],
    ) -> ServiceResult<HashMap<Uuid, Vec<Message>>> {
        if root_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            r#"{SELECT_MESSAGE}
            WHERE m.parent_id = ANY($2)
              AND {NOT_HIDDEN}
            ORDER BY m.created_at, m.id
            "#
        );

        let rows = sqlx::query_as::<_, Message>(&sql)
            .bind(viewer_id)
            .bind(root_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut grouped: HashMap<Uuid, Vec<Message>> = HashMap::new();
        for comment in rows {
            if let Some(parent_id) = comment.parent_id {
                grouped.entry(parent_id).or_default().push(comment);
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
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET text = $1, updated_at = $2
            WHERE id = $3 AND user_id = $4
            "#,
        )
        .bind(text)
        .bind(now)
        .bind(id)
        .bind(author_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::message_not_found(id));
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
        let mut tx = self.pool.begin().await?;

        let current = Self::lock_owned(&mut tx, author_id, id).await?;
        let orphaned = orphaned_blobs(current.refs(), attachment.blob_refs());
        Self::enqueue_blob_deletes(&mut tx, &orphaned, now).await?;

        sqlx::query(
            r#"
            UPDATE messages
            SET attachment_id = $1,
                attachment_type = $2,
                attachment_thumbnail_id = $3,
                updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(&attachment.id)
        .bind(&attachment.mime_type)
        .bind(&attachment.thumbnail_id)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_message(
        &self,
        author_id: &str,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;

        let target = Self::lock_owned(&mut tx, author_id, id).await?;

        let comments = if target.parent_id.is_none() {
            sqlx::query_as::<_, BlobRow>(
                r#"
                SELECT id, parent_id, attachment_id, attachment_thumbnail_id
                FROM messages
                WHERE parent_id = $1
                FOR UPDATE
                "#,
            )
            .bind(id)
            .fetch_all(&mut *tx)
            .await?
        } else {
            Vec::new()
        };

        let blobs = cascade_blobs(
            std::iter::once(target.refs()).chain(comments.iter().map(BlobRow::refs)),
        );
        Self::enqueue_blob_deletes(&mut tx, &blobs, now).await?;

        let ids: Vec<Uuid> = std::iter::once(target.id)
            .chain(comments.iter().map(|c| c.id))
            .collect();

        sqlx::query("DELETE FROM message_likes WHERE message_id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM message_visibility WHERE message_id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM messages WHERE parent_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            message_id = %id,
            comments = comments.len(),
            blobs = blobs.len(),
            "message deleted"
        );
        Ok(())
    }

    async fn like_message(
        &self,
        user_id: &str,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> ServiceResult<i64> {
        sqlx::query(
            r#"
            INSERT INTO message_likes (message_id, user_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (message_id, user_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| missing_target_as_not_found(e, id))?;

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM message_likes WHERE message_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn messages_likes(
        &self,
        ids: &[Uuid],
    ) -> ServiceResult<HashMap<Uuid, Vec<MessageLike>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, MessageLike>(
            r#"
            SELECT l.message_id, l.user_id, COALESCE(u.name, l.user_id) AS user_name, l.created_at
            FROM message_likes l
            LEFT JOIN users u ON u.id = l.user_id
            WHERE l.message_id = ANY($1)
            ORDER BY l.message_id, l.created_at, l.user_id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

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
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        if visible {
            sqlx::query("DELETE FROM message_visibility WHERE user_id = $1 AND message_id = $2")
                .bind(user_id)
                .bind(id)
                .execute(&self.pool)
                .await?;
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO message_visibility (user_id, message_id, visibility, created_at)
            VALUES ($1, $2, FALSE, $3)
            ON CONFLICT (user_id, message_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| missing_target_as_not_found(e, id))?;

        Ok(())
    }

    async fn pending_blob_deletes(&self, limit: i64) -> ServiceResult<Vec<PendingBlobDelete>> {
        let rows = sqlx::query_as::<_, PendingBlobDelete>(
            r#"
            SELECT blob_id, enqueued_at
            FROM blob_pending_deletes
            ORDER BY id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
