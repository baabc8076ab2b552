//! Request matching predicates.
//!
//! # Design Decisions
//! - Header values compare case-insensitively, paths case-sensitively
//! - Matchers see only method, headers and path, never the body
//! - No regex: suffix and equality checks only

use axum::http::{header, HeaderMap, Method};

/// The parts of a request that routing looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestHead<'a> {
    pub method: &'a Method,
    pub headers: &'a HeaderMap,
    pub path: &'a str,
}

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, head: &RequestHead<'_>) -> bool;
}

/// Matches a single HTTP method.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    method: Method,
}

impl MethodMatcher {
    pub fn new(method: Method) -> Self {
        Self { method }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, head: &RequestHead<'_>) -> bool {
        *head.method == self.method
    }
}

/// Matches an `Upgrade` header naming a protocol.
#[derive(Debug, Clone)]
pub struct UpgradeMatcher {
    protocol: &'static str,
}

impl UpgradeMatcher {
    pub fn new(protocol: &'static str) -> Self {
        Self { protocol }
    }

    pub fn websocket() -> Self {
        Self::new("websocket")
    }
}

impl Matcher for UpgradeMatcher {
    fn matches(&self, head: &RequestHead<'_>) -> bool {
        header_names_protocol(head.headers, self.protocol)
    }
}

/// True if the `Upgrade` header equals `protocol`, ignoring ASCII case.
pub fn header_names_protocol(headers: &HeaderMap, protocol: &str) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case(protocol))
        .unwrap_or(false)
}

/// Matches when the path ends with any of a fixed set of suffixes.
#[derive(Debug, Clone)]
pub struct PathSuffixMatcher {
    suffixes: &'static [&'static str],
}

impl PathSuffixMatcher {
    pub fn new(suffixes: &'static [&'static str]) -> Self {
        Self { suffixes }
    }
}

impl Matcher for PathSuffixMatcher {
    fn matches(&self, head: &RequestHead<'_>) -> bool {
        self.suffixes.iter().any(|s| head.path.ends_with(s))
    }
}
