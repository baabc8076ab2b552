//! WebSocket relay subsystem.
//!
//! # Data Flow
//! ```text
//! Client ←── axum WebSocket ──→ bridge.rs ←── tungstenite ──→ Upstream
//!                                   │
//!                                   ▼
//!                      session.rs (state machine, no I/O)
//!                                   │
//!                                   ▼
//!                      queue.rs (frames held until upstream opens)
//! ```
//!
//! # Design Decisions
//! - Client is accepted before the upstream handshake completes
//! - One task per session; no locks, no shared state between sessions
//! - Frames are buffered only while connecting, then forwarded directly
//! - Close codes and reasons pass through verbatim in both directions
//! - One upstream connection per client, never pooled

pub mod bridge;
pub mod frame;
pub mod queue;
pub mod session;
pub mod upstream;

pub use bridge::{run_session, RelayOptions};
pub use frame::{CloseReason, Frame};
pub use queue::{PendingQueue, QueueError};
pub use session::{Action, RelaySession, RelayState};
pub use upstream::{UpstreamEndpoint, UpstreamError, UpstreamTarget};
