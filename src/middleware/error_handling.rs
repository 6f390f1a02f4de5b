use crate::error::AppError;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

/// Uniform JSON error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, status: u16) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            status,
        }
    }
}

pub fn map_error(err: &AppError) -> (StatusCode, ErrorResponse) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let error = match err {
        AppError::Validation(_) => "validation_error",
        AppError::Unauthorized => "authentication_error",
        AppError::Forbidden => "authorization_error",
        AppError::NotFound(_) => "not_found_error",
        AppError::CapacityExceeded(_) => "conflict_error",
        AppError::Config(_)
        | AppError::StartServer(_)
        | AppError::Database(_)
        | AppError::Internal => "server_error",
    };

    // Storage failures stay opaque to callers; the detail goes to the log.
    let message = match err {
        AppError::Database(e) => {
            tracing::error!(error = %e, "database failure surfaced to request");
            "internal server error".to_string()
        }
        other => other.to_string(),
    };

    (status, ErrorResponse::new(error, &message, status.as_u16()))
}

pub fn into_response(err: AppError) -> impl IntoResponse {
    let (status, response) = map_error(&err);
    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404_body() {
        let (status, body) = map_error(&AppError::NotFound("conversation 7".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "not_found_error");
        assert_eq!(body.status, 404);
        assert!(body.message.contains("conversation 7"));
    }

    #[test]
    fn database_detail_is_not_leaked() {
        let (status, body) = map_error(&AppError::Database(sqlx::Error::PoolClosed));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "internal server error");
    }
}
