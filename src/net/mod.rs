//! Session accounting and transport security.
//!
//! # Design Decisions
//! - Each upgraded WebSocket is one session with its own ID
//! - Session slots are a semaphore: refusing is cheaper than queueing
//! - Guards release slots on drop, including on panic
//! - One rustls crypto provider per process, shared by listener and client

pub mod connection;
pub mod tls;

pub use connection::{SessionGuard, SessionId, SessionTracker};
