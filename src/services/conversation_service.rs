use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::MAX_GROUP_PARTICIPANTS;
use crate::models::{Conversation, ConversationKind, Participant, ParticipantRole};

/// Lightweight per-conversation view for listing a user's conversations.
/// Participant usernames are ordered by join time (owner/first member leads).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub participant_usernames: Vec<String>,
}

pub struct ConversationService;

impl ConversationService {
    /// Creates a one-to-one conversation with exactly two participants.
    pub async fn create_direct(
        db: &Pool<Postgres>,
        user_a: Uuid,
        user_b: Uuid,
    ) -> AppResult<Conversation> {
        if user_a == user_b {
            return Err(AppError::Validation(
                "a direct conversation requires two distinct participants".into(),
            ));
        }
        Self::ensure_user_exists(db, user_a).await?;
        Self::ensure_user_exists(db, user_b).await?;

        let id = Uuid::new_v4();
        let mut tx = db.begin().await?;
        let row = sqlx::query(
            "INSERT INTO conversations (id, kind) VALUES ($1, 'direct') RETURNING created_at",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        let created_at: DateTime<Utc> = row.get("created_at");

        sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id, role) \
             VALUES ($1, $2, 'member'), ($1, $3, 'member')",
        )
        .bind(id)
        .bind(user_a)
        .bind(user_b)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Conversation {
            id,
            kind: ConversationKind::Direct,
            name: None,
            created_at,
        })
    }

    /// Creates a group conversation with the owner as its sole initial member.
    pub async fn create_group(
        db: &Pool<Postgres>,
        name: &str,
        owner_id: Uuid,
    ) -> AppResult<Conversation> {
        Self::ensure_user_exists(db, owner_id).await?;

        let id = Uuid::new_v4();
        let mut tx = db.begin().await?;
        let row = sqlx::query(
            "INSERT INTO conversations (id, kind, name) VALUES ($1, 'group', $2) \
             RETURNING created_at",
        )
        .bind(id)
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;
        let created_at: DateTime<Utc> = row.get("created_at");

        sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id, role) \
             VALUES ($1, $2, 'owner')",
        )
        .bind(id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Conversation {
            id,
            kind: ConversationKind::Group,
            name: Some(name.to_string()),
            created_at,
        })
    }

    /// Adds a participant to a group conversation, enforcing the membership
    /// cap. Adding a user who is already a participant is a no-op (the insert
    /// hits the primary key and does nothing), so retries stay safe.
    pub async fn add_participant(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
        role: ParticipantRole,
    ) -> AppResult<Conversation> {
        let conversation = Self::get(db, conversation_id).await?;
        Self::ensure_user_exists(db, user_id).await?;

        match conversation.kind {
            ConversationKind::Direct => {
                return Err(AppError::Validation(
                    "cannot add participants to a direct conversation".into(),
                ));
            }
            ConversationKind::Group => {
                let count = Self::count_participants(db, conversation_id).await?;
                if count >= MAX_GROUP_PARTICIPANTS {
                    return Err(AppError::CapacityExceeded(format!(
                        "group conversation already has maximum {MAX_GROUP_PARTICIPANTS} participants"
                    )));
                }
            }
        }

        sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id, role) \
             VALUES ($1, $2, $3) ON CONFLICT (conversation_id, user_id) DO NOTHING",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(role.as_str())
        .execute(db)
        .await?;

        Ok(conversation)
    }

    pub async fn get(db: &Pool<Postgres>, conversation_id: Uuid) -> AppResult<Conversation> {
        let row = sqlx::query(
            "SELECT id, kind, name, created_at FROM conversations WHERE id = $1",
        )
        .bind(conversation_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("conversation {conversation_id}")))?;

        let kind: String = row.get("kind");
        Ok(Conversation {
            id: row.get("id"),
            kind: ConversationKind::parse(&kind).ok_or(AppError::Internal)?,
            name: row.get("name"),
            created_at: row.get("created_at"),
        })
    }

    /// All membership rows for a conversation, join order first.
    pub async fn participants(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
    ) -> AppResult<Vec<Participant>> {
        let rows = sqlx::query(
            r#"
            SELECT cp.conversation_id, cp.user_id, u.username, cp.role, cp.joined_at
            FROM conversation_participants cp
            JOIN users u ON u.id = cp.user_id
            WHERE cp.conversation_id = $1
            ORDER BY cp.joined_at ASC, u.username ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(db)
        .await?;

        rows.into_iter()
            .map(|row| {
                let role: String = row.get("role");
                Ok(Participant {
                    conversation_id: row.get("conversation_id"),
                    user_id: row.get("user_id"),
                    username: row.get("username"),
                    role: ParticipantRole::parse(&role).ok_or(AppError::Internal)?,
                    joined_at: row.get("joined_at"),
                })
            })
            .collect()
    }

    /// Every conversation the user participates in, oldest first.
    pub async fn list_for_user(
        db: &Pool<Postgres>,
        user_id: Uuid,
    ) -> AppResult<Vec<ConversationSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.kind, c.name,
                   (SELECT COALESCE(array_agg(u.username ORDER BY p.joined_at ASC, u.username ASC),
                                    ARRAY[]::TEXT[])
                    FROM conversation_participants p
                    JOIN users u ON u.id = p.user_id
                    WHERE p.conversation_id = c.id) AS usernames
            FROM conversations c
            JOIN conversation_participants cp ON cp.conversation_id = c.id
            WHERE cp.user_id = $1
            ORDER BY c.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;

        rows.into_iter()
            .map(|row| {
                let kind: String = row.get("kind");
                Ok(ConversationSummary {
                    id: row.get("id"),
                    kind: ConversationKind::parse(&kind).ok_or(AppError::Internal)?,
                    name: row.get("name"),
                    participant_usernames: row.try_get("usernames")?,
                })
            })
            .collect()
    }

    /// User ids of all participants, used by the fanout dispatcher.
    pub async fn participant_user_ids(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
    ) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            "SELECT user_id FROM conversation_participants WHERE conversation_id = $1",
        )
        .bind(conversation_id)
        .fetch_all(db)
        .await?;
        Ok(ids)
    }

    pub async fn count_participants(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM conversation_participants WHERE conversation_id = $1",
        )
        .bind(conversation_id)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    pub async fn is_participant(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<bool> {
        let rec = sqlx::query(
            "SELECT 1 FROM conversation_participants \
             WHERE conversation_id = $1 AND user_id = $2 LIMIT 1",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(rec.is_some())
    }

    /// Authorization guard for send/read. Existence is checked first so a
    /// request against a missing conversation gets NotFound, while a
    /// non-participant probing a real conversation gets Forbidden.
    pub async fn ensure_participant(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<()> {
        if !Self::exists(db, conversation_id).await? {
            return Err(AppError::NotFound(format!("conversation {conversation_id}")));
        }
        if !Self::is_participant(db, conversation_id, user_id).await? {
            return Err(AppError::Forbidden);
        }
        Ok(())
    }

    pub async fn exists(db: &Pool<Postgres>, conversation_id: Uuid) -> AppResult<bool> {
        let rec = sqlx::query("SELECT 1 FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .fetch_optional(db)
            .await?;
        Ok(rec.is_some())
    }

    pub(crate) async fn ensure_user_exists(db: &Pool<Postgres>, user_id: Uuid) -> AppResult<()> {
        let rec = sqlx::query("SELECT 1 FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(db)
            .await?;
        if rec.is_none() {
            return Err(AppError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }
}
