//! WebSocket entry point.
//!
//! # Responsibilities
//! - Re-check that the request really is a WebSocket upgrade
//! - Admit the session against the concurrent session limit
//! - Complete the client handshake and hand both sockets to the relay
//!
//! # Design Decisions
//! - The upgrade check does not trust the router: it runs again here
//! - Nothing outbound is opened for a rejected request
//! - The upstream target comes from the request's path and query only

use axum::{
    body::Body,
    extract::{ws::WebSocketUpgrade, FromRequestParts},
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::response::{self, AppError};
use crate::lifecycle::Shutdown;
use crate::net::SessionTracker;
use crate::observability::metrics;
use crate::relay::{run_session, RelayOptions, UpstreamEndpoint};
use crate::routing::matcher::header_names_protocol;

/// The request is not a WebSocket upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Expected WebSocket connection")]
pub struct UpgradeRejected;

impl IntoResponse for UpgradeRejected {
    fn into_response(self) -> Response {
        response::text(StatusCode::BAD_REQUEST, self.to_string())
    }
}

/// Accept only requests whose `Upgrade` header names `websocket`
/// (any ASCII case).
pub fn validate_upgrade(headers: &HeaderMap) -> Result<(), UpgradeRejected> {
    if header_names_protocol(headers, "websocket") {
        Ok(())
    } else {
        Err(UpgradeRejected)
    }
}

/// Shared state for relay upgrades.
#[derive(Debug, Clone)]
pub struct RelayContext {
    pub endpoint: UpstreamEndpoint,
    pub options: RelayOptions,
    pub sessions: SessionTracker,
    pub shutdown: Shutdown,
}

/// Upgrade the client and start a relay session.
pub async fn relay_upgrade(
    context: &RelayContext,
    request: Request<Body>,
    request_id: &str,
) -> Result<Response, AppError> {
    if let Err(rejected) = validate_upgrade(request.headers()) {
        tracing::warn!(request_id = %request_id, "Relay request without WebSocket upgrade");
        return Ok(rejected.into_response());
    }

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = context.endpoint.target_for(path_and_query)?;

    let (mut parts, _body) = request.into_parts();
    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            tracing::warn!(
                request_id = %request_id,
                reason = %rejection,
                "Malformed WebSocket upgrade"
            );
            return Ok(UpgradeRejected.into_response());
        }
    };

    let Some(guard) = context.sessions.try_track() else {
        tracing::warn!(
            request_id = %request_id,
            max_sessions = context.sessions.max_sessions(),
            "Relay session limit reached"
        );
        metrics::session_rejected();
        return Ok(response::text(
            StatusCode::SERVICE_UNAVAILABLE,
            "Too many relay sessions",
        ));
    };

    tracing::info!(
        request_id = %request_id,
        session_id = %guard.id(),
        target_url = %target,
        "Accepting WebSocket upgrade"
    );

    let shutdown = context.shutdown.subscribe();
    let options = context.options;
    let session_id = guard.id();
    Ok(upgrade
        .on_failed_upgrade(move |e| {
            tracing::warn!(session_id = %session_id, error = %e, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| run_session(socket, target, options, shutdown, guard)))
}
