use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Message;
use crate::services::conversation_service::ConversationService;

/// Outcome of an append: the stored row plus whether this call created it.
/// An idempotent replay returns the pre-existing row with `created == false`,
/// and the caller must not publish a second delivery event for it.
#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub message: Message,
    pub created: bool,
}

pub struct MessageService;

impl MessageService {
    /// Appends a message to a conversation.
    ///
    /// When a non-blank idempotency key is supplied, the key is unique per
    /// conversation: a replayed send returns the original row without writing.
    /// The lookup-then-insert sequence is race-free because the uniqueness
    /// constraint lives in the database; losing the insert race is handled by
    /// re-fetching the winner, never surfaced as an error.
    pub async fn append(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        sender_id: Uuid,
        body: &str,
        idempotency_key: Option<&str>,
    ) -> AppResult<AppendOutcome> {
        // Existence checks precede the membership check: a missing
        // conversation or sender is NotFound, only a real non-member is
        // Forbidden.
        if !ConversationService::exists(db, conversation_id).await? {
            return Err(AppError::NotFound(format!("conversation {conversation_id}")));
        }
        ConversationService::ensure_user_exists(db, sender_id).await?;
        if !ConversationService::is_participant(db, conversation_id, sender_id).await? {
            return Err(AppError::Forbidden);
        }

        let key = idempotency_key.map(str::trim).filter(|k| !k.is_empty());

        if let Some(key) = key {
            if let Some(existing) = Self::find_by_idempotency_key(db, conversation_id, key).await? {
                return Ok(AppendOutcome {
                    message: existing,
                    created: false,
                });
            }
        }

        let inserted = sqlx::query_as::<_, Message>(
            "INSERT INTO messages (conversation_id, sender_id, body, idempotency_key) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (conversation_id, idempotency_key) DO NOTHING \
             RETURNING id, conversation_id, sender_id, body, idempotency_key, created_at",
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(body)
        .bind(key)
        .fetch_optional(db)
        .await?;

        match inserted {
            Some(message) => Ok(AppendOutcome {
                message,
                created: true,
            }),
            None => {
                // A concurrent send with the same key won the insert race.
                let key = key.ok_or(AppError::Internal)?;
                let winner = Self::find_by_idempotency_key(db, conversation_id, key)
                    .await?
                    .ok_or(AppError::Internal)?;
                Ok(AppendOutcome {
                    message: winner,
                    created: false,
                })
            }
        }
    }

    /// All messages of a conversation, oldest first.
    pub async fn list_all(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
    ) -> AppResult<Vec<Message>> {
        if !ConversationService::exists(db, conversation_id).await? {
            return Err(AppError::NotFound(format!("conversation {conversation_id}")));
        }
        let messages = sqlx::query_as::<_, Message>(
            "SELECT id, conversation_id, sender_id, body, idempotency_key, created_at \
             FROM messages WHERE conversation_id = $1 ORDER BY id ASC",
        )
        .bind(conversation_id)
        .fetch_all(db)
        .await?;
        Ok(messages)
    }

    /// Cursor page: up to `limit` messages with id strictly greater than
    /// `after_id`, ascending. The cursor is the last id when the page is full.
    pub async fn list_page(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        after_id: Option<i64>,
        limit: i64,
    ) -> AppResult<(Vec<Message>, Option<i64>)> {
        if !ConversationService::exists(db, conversation_id).await? {
            return Err(AppError::NotFound(format!("conversation {conversation_id}")));
        }
        let messages = sqlx::query_as::<_, Message>(
            "SELECT id, conversation_id, sender_id, body, idempotency_key, created_at \
             FROM messages \
             WHERE conversation_id = $1 AND id > $2 \
             ORDER BY id ASC LIMIT $3",
        )
        .bind(conversation_id)
        .bind(after_id.unwrap_or(0))
        .bind(limit)
        .fetch_all(db)
        .await?;

        let next_cursor = page_cursor(messages.len(), limit, messages.last().map(|m| m.id));
        Ok((messages, next_cursor))
    }

    async fn find_by_idempotency_key(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        key: &str,
    ) -> AppResult<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(
            "SELECT id, conversation_id, sender_id, body, idempotency_key, created_at \
             FROM messages WHERE conversation_id = $1 AND idempotency_key = $2",
        )
        .bind(conversation_id)
        .bind(key)
        .fetch_optional(db)
        .await?;
        Ok(message)
    }
}

/// Cursor heuristic shared by message and event pagination: a cursor is issued
/// exactly when the page is full. A page that is full and also the true end of
/// the sequence costs the client one extra empty request, which is accepted.
pub fn page_cursor(page_len: usize, limit: i64, last_id: Option<i64>) -> Option<i64> {
    if page_len as i64 == limit {
        last_id
    } else {
        None
    }
}
