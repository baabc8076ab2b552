//! Forward API requests to an HTTP translation service.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode, Uri},
    response::Response,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::api::{ApiDelegate, ApiError};

/// Sends each request to `base` + the original path and query and streams
/// the answer back as-is.
#[derive(Clone)]
pub struct ForwardingDelegate {
    base: String,
    client: Client<HttpConnector, Body>,
}

impl ForwardingDelegate {
    /// `base` is an absolute `http://` URL, optionally with a path prefix.
    pub fn new(base: &str) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            base: base.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn target_uri(&self, original: &Uri) -> Result<Uri, ApiError> {
        let path_and_query = original
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        format!("{}{}", self.base, path_and_query)
            .parse()
            .map_err(|e| ApiError::new(format!("Invalid API target: {}", e)))
    }
}

impl std::fmt::Debug for ForwardingDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardingDelegate")
            .field("base", &self.base)
            .finish()
    }
}

#[async_trait]
impl ApiDelegate for ForwardingDelegate {
    async fn handle(&self, request: Request<Body>) -> Result<Response, ApiError> {
        let (mut parts, body) = request.into_parts();
        parts.uri = self.target_uri(&parts.uri)?;
        // Let the client derive Host from the target.
        parts.headers.remove(header::HOST);

        tracing::debug!(method = %parts.method, target = %parts.uri, "Forwarding API request");

        let response: hyper::Response<hyper::body::Incoming> = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .map_err(|e| {
                ApiError::with_status(
                    StatusCode::BAD_GATEWAY,
                    format!("API backend request failed: {}", e),
                )
            })?;

        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}
