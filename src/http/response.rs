//! Response construction.
//!
//! # Responsibilities
//! - CORS preflight answers
//! - Plain-text error bodies with a consistent content type
//! - Map every handler failure (including panics) to a 500 text response

use std::any::Any;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::assets::AssetError;
use crate::relay::UpstreamError;

pub const TEXT_PLAIN_UTF8: &str = "text/plain;charset=UTF-8";

const GENERIC_ERROR: &str = "Unknown error occurred";

/// Answer to an `OPTIONS` request on any path: 200, no body.
pub fn cors_preflight() -> Response {
    let mut response = Response::new(Body::empty());
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

/// A `text/plain;charset=UTF-8` response.
pub fn text(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF8))],
        body.into(),
    )
        .into_response()
}

/// Failures that escape a request handler.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Error loading resource")]
    Asset(#[from] AssetError),

    #[error("{0}")]
    Upstream(#[from] UpstreamError),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, detail = ?self, "Request handling error");
        let message = self.to_string();
        let body = if message.is_empty() {
            GENERIC_ERROR.to_string()
        } else {
            message
        };
        text(StatusCode::INTERNAL_SERVER_ERROR, body)
    }
}

/// Turn a handler panic into the same shape as any other 500.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        GENERIC_ERROR.to_string()
    };
    tracing::error!(panic = %message, "Handler panicked");
    text(StatusCode::INTERNAL_SERVER_ERROR, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn preflight_has_three_headers_and_no_body() {
        let response = cors_preflight();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "GET, POST, OPTIONS");
        assert_eq!(
            headers["access-control-allow-headers"],
            "Content-Type, Authorization"
        );
        assert!(body_string(response).await.is_empty());
    }

    #[tokio::test]
    async fn internal_error_carries_its_message() {
        let response = AppError::Internal("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONTENT_TYPE], TEXT_PLAIN_UTF8);
        assert_eq!(body_string(response).await, "boom");
    }

    #[tokio::test]
    async fn empty_message_falls_back_to_generic() {
        let response = AppError::Internal(String::new()).into_response();
        assert_eq!(body_string(response).await, GENERIC_ERROR);
    }

    #[tokio::test]
    async fn panic_payload_becomes_body() {
        let response = panic_response(Box::new("exploded"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "exploded");
    }
}
