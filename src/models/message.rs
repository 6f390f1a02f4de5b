use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted message. The id is assigned by the store (BIGSERIAL) and is
/// strictly increasing, which makes it usable as a pagination cursor.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}
