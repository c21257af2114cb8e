use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Bodies are `{"error": <stable code>, "message": <text>}`; the code is what
/// clients branch on.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed request fields. Carries the stable error code.
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Not-found and not-owned collapse to the same code so callers cannot
    /// enumerate other users' rows.
    #[error("Not found: {0}")]
    NotFound(&'static str),

    /// Entity exists but is not in a state the operation accepts.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(&'static str),

    #[error("Annual match quota exhausted")]
    UpgradeRequired,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// External NLP call failed. Only ever surfaces inside workers, which
    /// translate it to a status transition plus a queue-visible rethrow.
    #[error("NLP failure: {0}")]
    Nlp(#[from] crate::nlp_client::NlpError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code used in the response body.
    pub fn code(&self) -> &str {
        match self {
            AppError::InvalidInput(code) => code,
            AppError::PayloadTooLarge => "file_too_large",
            AppError::UnsupportedMediaType(_) => "unsupported_media_type",
            AppError::NotFound(code) => code,
            AppError::PreconditionFailed(code) => code,
            AppError::UpgradeRequired => "upgrade_required",
            AppError::Unauthorized => "unauthorized",
            AppError::Database(_) => "database_error",
            AppError::Nlp(_) => "nlp_error",
            AppError::Storage(_) => "storage_error",
            AppError::Queue(_) => "queue_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PreconditionFailed(_) => StatusCode::CONFLICT,
            AppError::UpgradeRequired => StatusCode::PAYMENT_REQUIRED,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Database(_)
            | AppError::Nlp(_)
            | AppError::Storage(_)
            | AppError::Queue(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                "A database error occurred".to_string()
            }
            AppError::Nlp(e) => {
                tracing::error!("NLP failure: {e}");
                "An analysis error occurred".to_string()
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                "A storage error occurred".to_string()
            }
            AppError::Queue(msg) => {
                tracing::error!("Queue error: {msg}");
                "A queue error occurred".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": self.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_error_maps_to_402() {
        assert_eq!(AppError::UpgradeRequired.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(AppError::UpgradeRequired.code(), "upgrade_required");
    }

    #[test]
    fn test_precondition_carries_precise_code() {
        let err = AppError::PreconditionFailed("resume_not_ready");
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "resume_not_ready");
    }

    #[test]
    fn test_not_owned_is_indistinguishable_from_not_found() {
        let not_found = AppError::NotFound("resume_not_found");
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.code(), "resume_not_found");
    }

    #[test]
    fn test_infra_errors_collapse_to_500() {
        let err = AppError::Internal(anyhow::anyhow!("boom"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "internal_error");
    }
}
