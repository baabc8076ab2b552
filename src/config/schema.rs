//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Upstream streaming endpoint used when nothing else is configured.
pub const DEFAULT_UPSTREAM_ENDPOINT: &str = "wss://generativelanguage.googleapis.com";

/// Root configuration for the edge relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Upstream streaming endpoint.
    pub upstream: UpstreamConfig,

    /// WebSocket relay limits.
    pub relay: RelayLimits,

    /// Static asset root.
    pub assets: AssetConfig,

    /// API delegation target.
    pub api: ApiConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// How long shutdown waits for relay sessions to drain, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Upstream streaming endpoint.
///
/// Process-wide: the request only ever contributes path and query.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Scheme and authority, e.g. "wss://generativelanguage.googleapis.com".
    pub endpoint: String,

    /// Upper bound on the outbound WebSocket handshake, in seconds.
    pub handshake_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_UPSTREAM_ENDPOINT.to_string(),
            handshake_timeout_secs: 10,
        }
    }
}

/// Per-session and global relay limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayLimits {
    /// Frames buffered while the upstream handshake is in flight.
    pub max_pending_frames: usize,

    /// Maximum concurrent relay sessions.
    pub max_sessions: usize,

    /// How long one frame may wait on a peer that is not reading before
    /// that side counts as failed.
    pub send_timeout_secs: u64,
}

impl Default for RelayLimits {
    fn default() -> Self {
        Self {
            max_pending_frames: 1024,
            max_sessions: 10_000,
            send_timeout_secs: 10,
        }
    }
}

/// Static asset configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory holding `index.html`, `404.html` and friends.
    pub root: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: "public".to_string(),
        }
    }
}

/// API delegation configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the API translation service (e.g., "http://127.0.0.1:8787").
    /// When unset, API routes answer 503.
    pub forward_to: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
