//! Configuration validation.
//!
//! Serde handles syntax; this module checks meaning: addresses parse,
//! the upstream endpoint is a bare WebSocket authority, limits are
//! non-zero. Every problem is reported, not just the first.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::RelayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("upstream.endpoint: {0}")]
    InvalidUpstream(String),

    #[error("api.forward_to: {0}")]
    InvalidApiTarget(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("observability.log_format: expected 'pretty' or 'json', got '{0}'")]
    UnknownLogFormat(String),
}

/// Validate a configuration, collecting all errors.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if let Err(reason) = check_upstream_endpoint(&config.upstream.endpoint) {
        errors.push(ValidationError::InvalidUpstream(reason));
    }

    if let Some(target) = &config.api.forward_to {
        if let Err(reason) = check_api_target(target) {
            errors.push(ValidationError::InvalidApiTarget(reason));
        }
    }

    let non_zero = [
        ("upstream.handshake_timeout_secs", config.upstream.handshake_timeout_secs as usize),
        ("timeouts.request_secs", config.timeouts.request_secs as usize),
        ("relay.max_pending_frames", config.relay.max_pending_frames),
        ("relay.max_sessions", config.relay.max_sessions),
        ("relay.send_timeout_secs", config.relay.send_timeout_secs as usize),
        ("security.max_body_size", config.security.max_body_size),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::UnknownLogFormat(other.to_string())),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_upstream_endpoint(endpoint: &str) -> Result<(), String> {
    let url = Url::parse(endpoint).map_err(|e| format!("'{}' does not parse: {}", endpoint, e))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(format!("scheme must be ws or wss, got '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    // Path and query always come from the inbound request.
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err("must not carry a path, query or fragment".to_string());
    }
    Ok(())
}

fn check_api_target(target: &str) -> Result<(), String> {
    let url = Url::parse(target).map_err(|e| format!("'{}' does not parse: {}", target, e))?;
    if url.scheme() != "http" {
        return Err(format!("scheme must be http, got '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}
