//! Request classification.
//!
//! Every inbound request gets exactly one treatment, decided in this order:
//! `OPTIONS` preflight, WebSocket upgrade, API route suffix, static asset.
//! The first match wins, so an API path is never served from disk even if
//! a file of that name exists.

use axum::http::{HeaderMap, Method};

use crate::routing::matcher::{
    Matcher, MethodMatcher, PathSuffixMatcher, RequestHead, UpgradeMatcher,
};

/// Paths ending in one of these are handed to the API delegate.
pub const API_ROUTE_SUFFIXES: &[&str] = &["/chat/completions", "/embeddings", "/models"];

/// How a request will be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    CorsPreflight,
    WebSocketRelay,
    ApiDelegate,
    StaticAsset,
}

impl RouteKind {
    /// Label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteKind::CorsPreflight => "cors_preflight",
            RouteKind::WebSocketRelay => "websocket",
            RouteKind::ApiDelegate => "api",
            RouteKind::StaticAsset => "static",
        }
    }
}

/// Immutable classifier built once at startup.
#[derive(Debug)]
pub struct RequestRouter {
    preflight: MethodMatcher,
    websocket: UpgradeMatcher,
    api: PathSuffixMatcher,
}

impl RequestRouter {
    pub fn new() -> Self {
        Self {
            preflight: MethodMatcher::new(Method::OPTIONS),
            websocket: UpgradeMatcher::websocket(),
            api: PathSuffixMatcher::new(API_ROUTE_SUFFIXES),
        }
    }

    pub fn classify(&self, method: &Method, headers: &HeaderMap, path: &str) -> RouteKind {
        let head = RequestHead {
            method,
            headers,
            path,
        };

        if self.preflight.matches(&head) {
            RouteKind::CorsPreflight
        } else if self.websocket.matches(&head) {
            RouteKind::WebSocketRelay
        } else if self.api.matches(&head) {
            RouteKind::ApiDelegate
        } else {
            RouteKind::StaticAsset
        }
    }
}

impl Default for RequestRouter {
    fn default() -> Self {
        Self::new()
    }
}
