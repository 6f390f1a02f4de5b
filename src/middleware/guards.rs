//! Request guards that make the authenticated identity explicit in handler
//! signatures, so a handler cannot accidentally skip it.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

/// The authenticated user for this request, extracted from the identity the
/// auth middleware placed in request extensions.
#[derive(Debug, Clone, Copy)]
pub struct User {
    pub id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for User
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .extensions
            .get::<Uuid>()
            .copied()
            .ok_or(AppError::Unauthorized)?;

        Ok(User { id: user_id })
    }
}
