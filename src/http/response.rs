//! Response handling and error mapping.
//!
//! # Responsibilities
//! - Map core errors to HTTP status codes
//! - Render error bodies as `{"error": "..."}`
//! - Attach `Retry-After` to rate-limit rejections
//!
//! # Design Decisions
//! - Entity and entry absence both surface as 404
//! - Label-based removal that matches nothing is a 404, not a 400
//! - Malformed input (labels, body, path segments, query) is a 400 with the
//!   same JSON body as every other error
//! - Oversized bodies keep their 413

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Build an error response with the standard body.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

impl RegistryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::NotFound { .. }
            | RegistryError::EntryNotFound { .. }
            | RegistryError::NoMatch { .. } => StatusCode::NOT_FOUND,
            RegistryError::Conflict { .. } => StatusCode::CONFLICT,
            RegistryError::InvalidLabelFormat { .. } => StatusCode::BAD_REQUEST,
            RegistryError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let mut response = error_response(self.status_code(), self.to_string());
        if let RegistryError::RateLimited { retry_after } = &self {
            // Whole seconds, at least 1.
            let secs = retry_after.as_secs().max(1);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Errors produced by the HTTP adapter.
#[derive(Debug)]
pub enum ApiError {
    /// A core operation failed.
    Registry(RegistryError),
    /// The request could not be decoded or failed validation.
    BadRequest(String),
    /// The body exceeded `security.max_body_size`.
    PayloadTooLarge(String),
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ApiError::Registry(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(rejection.body_text()),
            _ => ApiError::BadRequest(rejection.body_text()),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Registry(err) => {
                tracing::debug!(error = %err, "Request failed");
                err.into_response()
            }
            ApiError::BadRequest(message) => {
                tracing::debug!(error = %message, "Rejected malformed request");
                error_response(StatusCode::BAD_REQUEST, message)
            }
            ApiError::PayloadTooLarge(message) => {
                error_response(StatusCode::PAYLOAD_TOO_LARGE, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_rate_limited_response() {
        let response = RegistryError::RateLimited {
            retry_after: Duration::from_millis(200),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert!(parsed.error.starts_with("rate limit exceeded"));
    }

    #[test]
    fn test_status_mapping() {
        let no_match = RegistryError::NoMatch {
            group: "g".into(),
            version: 1,
            query: "a:b".into(),
        };
        assert_eq!(no_match.status_code(), StatusCode::NOT_FOUND);

        let invalid = RegistryError::InvalidLabelFormat {
            query: "ab".into(),
            reason: "no separator".into(),
        };
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let conflict = RegistryError::Conflict {
            kind: "config",
            name: "c".into(),
            version: 1,
        };
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let bad = ApiError::BadRequest("name is required".into()).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }
}
