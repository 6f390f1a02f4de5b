pub mod conversations;
pub mod events;
pub mod messages;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde_json::{json, Value};

use crate::middleware::auth::auth_middleware;
use crate::state::AppState;
use crate::websocket::handlers::ws_handler;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/conversations/:id/participants",
            post(conversations::add_participant),
        )
        .route(
            "/conversations/:id/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route("/conversations/:id/events", get(events::list_events))
        .route("/ws", get(ws_handler))
        .layer(middleware::from_fn(auth_middleware));

    Router::new()
        .route("/healthz", get(health))
        .nest("/api/v1", api)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.registry.count(),
    }))
}
