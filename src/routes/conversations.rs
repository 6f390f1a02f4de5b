use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::guards::User;
use crate::models::{Conversation, ConversationKind, Participant, ParticipantRole};
use crate::services::conversation_service::{ConversationService, ConversationSummary};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    pub participant_ids: Vec<Uuid>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddParticipantRequest {
    pub user_id: Uuid,
    pub role: Option<ParticipantRole>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub participants: Vec<ParticipantView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub user_id: Uuid,
    pub username: String,
    pub role: ParticipantRole,
}

impl ConversationResponse {
    fn from_parts(conversation: Conversation, participants: Vec<Participant>) -> Self {
        Self {
            id: conversation.id,
            kind: conversation.kind,
            name: conversation.name,
            participants: participants
                .into_iter()
                .map(|p| ParticipantView {
                    user_id: p.user_id,
                    username: p.username,
                    role: p.role,
                })
                .collect(),
        }
    }
}

pub async fn create_conversation(
    State(state): State<AppState>,
    _user: User,
    Json(req): Json<CreateConversationRequest>,
) -> AppResult<(StatusCode, Json<ConversationResponse>)> {
    let conversation = match req.kind {
        ConversationKind::Direct => {
            if req.participant_ids.len() != 2 {
                return Err(AppError::Validation(
                    "a direct conversation requires exactly two participants".into(),
                ));
            }
            ConversationService::create_direct(
                &state.db,
                req.participant_ids[0],
                req.participant_ids[1],
            )
            .await?
        }
        ConversationKind::Group => {
            if req.participant_ids.is_empty() {
                return Err(AppError::Validation(
                    "a group conversation requires at least one participant".into(),
                ));
            }
            let name = req.name.as_deref().unwrap_or("Group");
            let owner = req.participant_ids[0];
            let conversation =
                ConversationService::create_group(&state.db, name, owner).await?;
            for member in &req.participant_ids[1..] {
                ConversationService::add_participant(
                    &state.db,
                    conversation.id,
                    *member,
                    ParticipantRole::Member,
                )
                .await?;
            }
            conversation
        }
    };

    let participants = ConversationService::participants(&state.db, conversation.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ConversationResponse::from_parts(conversation, participants)),
    ))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    user: User,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    let summaries = ConversationService::list_for_user(&state.db, user.id).await?;
    Ok(Json(summaries))
}

pub async fn add_participant(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<AddParticipantRequest>,
) -> AppResult<Json<ConversationResponse>> {
    // Only existing participants may grow the conversation; an outsider must
    // not be able to add themselves or learn the member list.
    ConversationService::ensure_participant(&state.db, conversation_id, user.id).await?;

    let role = req.role.unwrap_or(ParticipantRole::Member);
    let conversation =
        ConversationService::add_participant(&state.db, conversation_id, req.user_id, role)
            .await?;
    let participants = ConversationService::participants(&state.db, conversation.id).await?;
    Ok(Json(ConversationResponse::from_parts(
        conversation,
        participants,
    )))
}
