//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, entry handler)
//!     → request.rs (request ID)
//!     → [routing classifies the request]
//!     → websocket.rs (upgrade + relay session) | api | assets
//!     → response.rs (preflight, error mapping)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::{RequestUuid, X_REQUEST_ID};
pub use response::AppError;
pub use server::{AppState, HttpServer};
pub use websocket::RelayContext;
