use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::guards::User;
use crate::models::Message;
use crate::services::conversation_service::ConversationService;
use crate::services::message_service::MessageService;
use crate::state::AppState;
use crate::websocket::events::EVENT_MESSAGE_CREATED;

pub const MAX_MESSAGE_LEN: usize = 4096;
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub body: String,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub cursor: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    /// Effective page size: absent or non-positive limits fall back to the
    /// default, oversized ones are capped.
    pub fn effective_limit(&self) -> i64 {
        match self.limit {
            Some(limit) if limit > 0 => limit.min(MAX_PAGE_SIZE),
            _ => DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: i64,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// Present only on send responses: "created" for a new row, "existing"
    /// for an idempotent replay. History items carry no status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<i64>,
}

/// Payload embedded in a `message.created` event. Same shape as the REST
/// response minus the replay status.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageEventPayload {
    id: i64,
    conversation_id: Uuid,
    sender_id: Uuid,
    sender_username: String,
    body: String,
    created_at: DateTime<Utc>,
}

pub async fn send_message(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let body = req.body.trim();
    if body.is_empty() {
        return Err(AppError::Validation("message body must not be empty".into()));
    }
    if body.chars().count() > MAX_MESSAGE_LEN {
        return Err(AppError::Validation(format!(
            "message body exceeds {MAX_MESSAGE_LEN} characters"
        )));
    }

    let stored_body = state.crypto.encrypt(conversation_id, body);
    let outcome = MessageService::append(
        &state.db,
        conversation_id,
        user.id,
        &stored_body,
        req.idempotency_key.as_deref(),
    )
    .await?;

    let sender_username = username_of(&state.db, outcome.message.sender_id).await?;
    let plaintext = state
        .crypto
        .decrypt(conversation_id, &outcome.message.body);

    if outcome.created {
        let payload = MessageEventPayload {
            id: outcome.message.id,
            conversation_id: outcome.message.conversation_id,
            sender_id: outcome.message.sender_id,
            sender_username: sender_username.clone(),
            body: plaintext.clone(),
            created_at: outcome.message.created_at,
        };
        match serde_json::to_string(&payload) {
            Ok(json) => {
                // The row is committed; a fanout failure must not turn the
                // accepted write into a client-visible error.
                if let Err(e) = state
                    .dispatcher
                    .publish(conversation_id, EVENT_MESSAGE_CREATED, &json)
                    .await
                {
                    tracing::warn!(
                        error = %e,
                        conversation_id = %conversation_id,
                        message_id = outcome.message.id,
                        "failed to publish message.created event"
                    );
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize message event payload");
            }
        }
    }

    let status_code = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status_code,
        Json(MessageResponse {
            id: outcome.message.id,
            conversation_id: outcome.message.conversation_id,
            sender_id: outcome.message.sender_id,
            sender_username,
            body: plaintext,
            created_at: outcome.message.created_at,
            status: Some(if outcome.created { "created" } else { "existing" }.to_string()),
        }),
    ))
}

pub async fn list_messages(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<PaginatedResponse<MessageResponse>>> {
    ConversationService::ensure_participant(&state.db, conversation_id, user.id).await?;

    let limit = params.effective_limit();
    let (messages, next_cursor) =
        MessageService::list_page(&state.db, conversation_id, params.cursor, limit).await?;

    let usernames = usernames_for(&state.db, &messages).await?;
    let items = messages
        .into_iter()
        .map(|m| {
            let sender_username = usernames
                .get(&m.sender_id)
                .cloned()
                .unwrap_or_else(|| m.sender_id.to_string());
            MessageResponse {
                id: m.id,
                conversation_id: m.conversation_id,
                sender_id: m.sender_id,
                sender_username,
                body: state.crypto.decrypt(conversation_id, &m.body),
                created_at: m.created_at,
                status: None,
            }
        })
        .collect();

    Ok(Json(PaginatedResponse { items, next_cursor }))
}

async fn username_of(db: &Pool<Postgres>, user_id: Uuid) -> AppResult<String> {
    let username: String = sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;
    Ok(username)
}

/// One batched lookup for the distinct senders of a page.
async fn usernames_for(
    db: &Pool<Postgres>,
    messages: &[Message],
) -> AppResult<HashMap<Uuid, String>> {
    let mut sender_ids: Vec<Uuid> = messages.iter().map(|m| m.sender_id).collect();
    sender_ids.sort_unstable();
    sender_ids.dedup();
    if sender_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query("SELECT id, username FROM users WHERE id = ANY($1)")
        .bind(&sender_ids)
        .fetch_all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.get("id"), row.get("username")))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        let absent = PageParams {
            cursor: None,
            limit: None,
        };
        assert_eq!(absent.effective_limit(), DEFAULT_PAGE_SIZE);

        let over = PageParams {
            cursor: None,
            limit: Some(500),
        };
        assert_eq!(over.effective_limit(), MAX_PAGE_SIZE);

        let zero = PageParams {
            cursor: None,
            limit: Some(0),
        };
        assert_eq!(zero.effective_limit(), DEFAULT_PAGE_SIZE);

        let negative = PageParams {
            cursor: None,
            limit: Some(-5),
        };
        assert_eq!(negative.effective_limit(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn history_items_omit_the_send_status() {
        let mut response = MessageResponse {
            id: 1,
            conversation_id: Uuid::nil(),
            sender_id: Uuid::nil(),
            sender_username: "ana".to_string(),
            body: "hi".to_string(),
            created_at: Utc::now(),
            status: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("\"status\""));

        response.status = Some("created".to_string());
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"created\""));
    }
}
