use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Event;
use crate::services::conversation_service::ConversationService;
use crate::services::message_service::page_cursor;

pub struct EventService;

impl EventService {
    /// Appends an event to the conversation's log. Ids come from the store and
    /// are strictly increasing, so they double as resume cursors.
    pub async fn append(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        event_type: &str,
        payload: &str,
    ) -> AppResult<Event> {
        let event = sqlx::query_as::<_, Event>(
            "INSERT INTO events (conversation_id, event_type, payload) \
             VALUES ($1, $2, $3) \
             RETURNING id, conversation_id, event_type, payload, created_at",
        )
        .bind(conversation_id)
        .bind(event_type)
        .bind(payload)
        .fetch_one(db)
        .await?;
        Ok(event)
    }

    /// Events after the cursor, ascending. Same cursor semantics as message
    /// pagination; used to catch up after a reconnect.
    pub async fn list_after(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        after_id: Option<i64>,
        limit: i64,
    ) -> AppResult<(Vec<Event>, Option<i64>)> {
        if !ConversationService::exists(db, conversation_id).await? {
            return Err(AppError::NotFound(format!("conversation {conversation_id}")));
        }
        let events = sqlx::query_as::<_, Event>(
            "SELECT id, conversation_id, event_type, payload, created_at \
             FROM events \
             WHERE conversation_id = $1 AND id > $2 \
             ORDER BY id ASC LIMIT $3",
        )
        .bind(conversation_id)
        .bind(after_id.unwrap_or(0))
        .bind(limit)
        .fetch_all(db)
        .await?;

        let next_cursor = page_cursor(events.len(), limit, events.last().map(|e| e.id));
        Ok((events, next_cursor))
    }
}
