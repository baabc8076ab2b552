//! Upstream connector.
//!
//! The upstream authority is fixed per process. A request only contributes
//! its path and query, so the relay can never be pointed at another host.

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite, MaybeTlsStream, WebSocketStream};
use url::Url;

/// Established outbound WebSocket.
pub type UpstreamStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("upstream endpoint must be a ws:// or wss:// authority, got '{0}'")]
    InvalidEndpoint(String),

    #[error("upstream handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("upstream connect failed: {0}")]
    Connect(#[from] tungstenite::Error),
}

/// Scheme and authority every relayed connection goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEndpoint {
    base: String,
}

impl UpstreamEndpoint {
    pub fn parse(endpoint: &str) -> Result<Self, UpstreamError> {
        let url = Url::parse(endpoint).map_err(|source| UpstreamError::InvalidUrl {
            url: endpoint.to_string(),
            source,
        })?;
        if !matches!(url.scheme(), "ws" | "wss")
            || url.host_str().is_none()
            || url.path() != "/"
            || url.query().is_some()
        {
            return Err(UpstreamError::InvalidEndpoint(endpoint.to_string()));
        }

        Ok(Self {
            base: url.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Build the target for an inbound request's path and query.
    ///
    /// Path and query are appended verbatim; the URL parser is only used to
    /// reject targets that would not form a valid URL.
    pub fn target_for(&self, path_and_query: &str) -> Result<UpstreamTarget, UpstreamError> {
        let raw = if path_and_query.starts_with('/') {
            format!("{}{}", self.base, path_and_query)
        } else {
            format!("{}/{}", self.base, path_and_query)
        };
        Url::parse(&raw).map_err(|source| UpstreamError::InvalidUrl {
            url: raw.clone(),
            source,
        })?;
        Ok(UpstreamTarget(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }
}

/// A fully resolved upstream URL for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget(String);

impl UpstreamTarget {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Open the outbound WebSocket, bounded by `handshake_timeout`.
pub async fn connect(
    target: &UpstreamTarget,
    handshake_timeout: Duration,
) -> Result<UpstreamStream, UpstreamError> {
    let handshake = tokio_tungstenite::connect_async(target.as_str());
    match tokio::time::timeout(handshake_timeout, handshake).await {
        Ok(Ok((stream, response))) => {
            tracing::debug!(
                target_url = %target,
                status = %response.status(),
                "Upstream handshake complete"
            );
            Ok(stream)
        }
        Ok(Err(e)) => Err(UpstreamError::Connect(e)),
        Err(_) => Err(UpstreamError::HandshakeTimeout(handshake_timeout)),
    }
}
