//! Edge request router with a WebSocket relay.
//!
//! Every inbound request is classified once and handed to one of four
//! treatments: CORS preflight, WebSocket relay to the configured upstream,
//! API delegation, or static asset serving.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Request treatments
pub mod api;
pub mod assets;
pub mod relay;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
