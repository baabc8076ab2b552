//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, headers, path)
//!     → router.rs (ordered classification)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: RouteKind
//! ```
//!
//! # Design Decisions
//! - Classifier is immutable after construction (shared without locks)
//! - Deterministic: same input always yields the same RouteKind
//! - First match wins, in a fixed order

pub mod matcher;
pub mod router;

pub use router::{RequestRouter, RouteKind, API_ROUTE_SUFFIXES};
