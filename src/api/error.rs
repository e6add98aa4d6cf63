use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::broker::BrokerError;

/// Type alias for Result with ApiError.
pub type ApiResult<T> = Result<T, ApiError>;

/// REST-surface error types.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Missing or unknown API key.
    #[error("invalid or missing api key")]
    Unauthorized,

    /// The request was invalid.
    #[error("{0}")]
    BadRequest(String),

    /// The requested resource was not found.
    #[error("{0}")]
    NotFound(String),

    /// The request conflicts with current state.
    #[error("{0}")]
    Conflict(String),

    /// Rejected because the server is shutting down.
    #[error("server is shutting down")]
    Unavailable,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "code": status.as_u16()
            }
        }));

        (status, body).into_response()
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::TopicExists(name) => {
                Self::Conflict(format!("topic '{name}' already exists"))
            }
            BrokerError::TopicNotFound(name) => Self::NotFound(format!("topic '{name}' not found")),
            BrokerError::BadRequest(msg) => Self::BadRequest(msg),
            BrokerError::ShuttingDown => Self::Unavailable,
        }
    }
}
