use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::middleware::guards::User;
use crate::state::AppState;
use crate::websocket::Session;

/// Upgrades to a websocket and ties the connection to the authenticated user.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    user: User,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user.id))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let session_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    state.registry.register(
        user_id,
        Session {
            id: session_id,
            tx,
        },
    );
    tracing::info!(user_id = %user_id, session_id = %session_id, "websocket connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if sender.send(frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = receiver.next() => {
                // The feed is push-only; inbound traffic is either keepalive
                // or a close.
                match inbound {
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(WsMessage::Ping(data))) => {
                        if sender.send(WsMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.registry.unregister(user_id, session_id);
    tracing::info!(user_id = %user_id, session_id = %session_id, "websocket disconnected");
}
