//! API delegation.
//!
//! Requests for the OpenAI-style routes (`/chat/completions`, `/embeddings`,
//! `/models`) are not handled here. They go to an injected [`ApiDelegate`]
//! whose response is passed back untouched. A delegate failure becomes a
//! text response with the error's status, 500 when it has none.

pub mod forward;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::response::text;

pub use forward::ForwardingDelegate;

/// Handles API requests on behalf of the relay.
#[async_trait]
pub trait ApiDelegate: Send + Sync {
    async fn handle(&self, request: Request<Body>) -> Result<Response, ApiError>;
}

/// A delegate failure, optionally carrying the status to answer with.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: Option<StatusCode>,
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// The status to answer with.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::error!(status = %status, error = %self.message, "API request error");
        let body = if self.message.is_empty() {
            "Unknown error occurred".to_string()
        } else {
            self.message
        };
        text(status, body)
    }
}

/// Used when no API backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredDelegate;

#[async_trait]
impl ApiDelegate for UnconfiguredDelegate {
    async fn handle(&self, _request: Request<Body>) -> Result<Response, ApiError> {
        Err(ApiError::with_status(
            StatusCode::SERVICE_UNAVAILABLE,
            "API delegation is not configured",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_defaults_to_500() {
        assert_eq!(ApiError::new("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ApiError::with_status(StatusCode::TOO_MANY_REQUESTS, "slow down").status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn error_response_is_plain_text_with_message() {
        let response = ApiError::with_status(StatusCode::UNAUTHORIZED, "bad key").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[axum::http::header::CONTENT_TYPE],
            "text/plain;charset=UTF-8"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"bad key");
    }

    #[tokio::test]
    async fn unconfigured_delegate_answers_503() {
        let err = UnconfiguredDelegate
            .handle(Request::new(Body::empty()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
