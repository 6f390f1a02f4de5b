use crate::error::AppError;
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

/// Header carrying the caller identity, set by the authenticating gateway.
/// Credential verification happens upstream; by the time a request reaches
/// this service the identity is already established.
pub const USER_ID_HEADER: &str = "x-user-id";

pub async fn auth_middleware(mut req: Request, next: Next) -> Response {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok());

    match user_id {
        Some(id) => {
            req.extensions_mut().insert(id);
            next.run(req).await
        }
        None => AppError::Unauthorized.into_response(),
    }
}
