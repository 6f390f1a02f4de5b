use axum::extract::{Path, Query, State};
use axum::Json;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::guards::User;
use crate::routes::messages::{PageParams, PaginatedResponse};
use crate::services::conversation_service::ConversationService;
use crate::services::event_service::EventService;
use crate::state::AppState;
use crate::websocket::events::EventEnvelope;

/// Resume feed: everything that happened in the conversation after the
/// client's cursor, in the same envelope shape the websocket pushes.
pub async fn list_events(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<PaginatedResponse<EventEnvelope>>> {
    ConversationService::ensure_participant(&state.db, conversation_id, user.id).await?;

    let limit = params.effective_limit();
    let (events, next_cursor) =
        EventService::list_after(&state.db, conversation_id, params.cursor, limit).await?;

    let items = events
        .into_iter()
        .map(|e| EventEnvelope {
            event_id: e.id,
            conversation_id: e.conversation_id,
            event_type: e.event_type,
            payload: e.payload,
            created_at: e.created_at,
        })
        .collect();

    Ok(Json(PaginatedResponse { items, next_cursor }))
}
