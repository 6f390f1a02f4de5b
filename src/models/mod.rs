pub mod conversation;
pub mod event;
pub mod message;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use conversation::{Conversation, ConversationKind, Participant, ParticipantRole};
pub use event::Event;
pub use message::Message;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}
