//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (`session_id`, `request_id`) instead of formatted text
//! - Request ID flows from the HTTP layer into every log line
//! - Metrics are opt-in and cheap when disabled

pub mod logging;
pub mod metrics;
