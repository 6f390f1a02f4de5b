use std::sync::Arc;

use axum::extract::ws::Message as WsMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::conversation_service::ConversationService;
use crate::services::event_service::EventService;
use crate::websocket::SessionRegistry;

pub const EVENT_MESSAGE_CREATED: &str = "message.created";

/// Wire frame pushed to websocket clients. The event id is the resume cursor
/// a client presents on reconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: i64,
    pub conversation_id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

/// Persists events and fans them out to the live sessions of every
/// conversation participant. Delivery is best effort: the durable event row
/// is the source of truth, a failed push only costs a log line and the client
/// catches up from its cursor.
pub struct EventDispatcher {
    db: Pool<Postgres>,
    registry: Arc<SessionRegistry>,
}

impl EventDispatcher {
    pub fn new(db: Pool<Postgres>, registry: Arc<SessionRegistry>) -> Self {
        Self { db, registry }
    }

    pub async fn publish(
        &self,
        conversation_id: Uuid,
        event_type: &str,
        payload: &str,
    ) -> AppResult<()> {
        let event = EventService::append(&self.db, conversation_id, event_type, payload).await?;

        let envelope = EventEnvelope {
            event_id: event.id,
            conversation_id: event.conversation_id,
            event_type: event.event_type,
            payload: event.payload,
            created_at: event.created_at,
        };
        // Serialized once, shared across every recipient session.
        let frame = match serde_json::to_string(&envelope) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, conversation_id = %conversation_id, "failed to serialize event envelope");
                return Ok(());
            }
        };

        let recipients = ConversationService::participant_user_ids(&self.db, conversation_id).await?;
        for user_id in recipients {
            for session in self.registry.channels_for(user_id) {
                if session.tx.send(WsMessage::Text(frame.clone())).is_err() {
                    // Stale session mid-teardown; its pump already exited.
                    tracing::warn!(
                        user_id = %user_id,
                        session_id = %session.id,
                        "pruning closed websocket session"
                    );
                    self.registry.unregister(user_id, session.id);
                }
            }
        }
        Ok(())
    }
}
