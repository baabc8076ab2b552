//! Relay session state machine.
//!
//! # States
//! ```text
//!              upstream opened
//! Connecting ──────────────────▶ Relaying
//!     │                              │
//!     │ close / error / shutdown     │ close / error / shutdown
//!     ▼                              ▼
//!   Closed ◀─────────────────────────┘
//! ```
//!
//! The session performs no I/O. Each event handler mutates the session and
//! returns the [`Action`]s the driver must carry out, in order. Handlers
//! take `&mut self`, so whoever owns the session serialises every queue
//! mutation for free.

use crate::net::SessionId;
use crate::relay::frame::{CloseReason, Frame};
use crate::relay::queue::{PendingQueue, QueueError};

/// Close code sent to the client when the upstream fails (internal error).
pub const CLOSE_UPSTREAM_FAILED: u16 = 1011;
/// Close code sent when the pending queue overflows (policy violation).
pub const CLOSE_PENDING_OVERFLOW: u16 = 1008;
/// Close code sent to both sides on process shutdown (going away).
pub const CLOSE_GOING_AWAY: u16 = 1001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Upstream handshake in flight; client frames are queued.
    Connecting,
    /// Upstream open; frames are forwarded directly.
    Relaying,
    /// Both sides torn down.
    Closed,
}

impl RelayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayState::Connecting => "connecting",
            RelayState::Relaying => "relaying",
            RelayState::Closed => "closed",
        }
    }
}

/// Work the driver performs on behalf of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SendUpstream(Frame),
    SendClient(Frame),
    CloseClient(Option<CloseReason>),
    CloseUpstream(Option<CloseReason>),
}

#[derive(Debug)]
pub struct RelaySession {
    id: SessionId,
    state: RelayState,
    pending: PendingQueue,
    client_open: bool,
    upstream_open: bool,
}

impl RelaySession {
    /// A session whose client side is already accepted.
    pub fn new(id: SessionId, max_pending_frames: usize) -> Self {
        Self {
            id,
            state: RelayState::Connecting,
            pending: PendingQueue::new(max_pending_frames),
            client_open: true,
            upstream_open: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == RelayState::Closed
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// A data frame arrived from the client.
    pub fn on_client_frame(&mut self, frame: Frame) -> Vec<Action> {
        match self.state {
            RelayState::Connecting => match self.pending.push(frame) {
                Ok(()) => Vec::new(),
                Err(QueueError::Full { limit, .. }) => {
                    tracing::warn!(
                        session_id = %self.id,
                        limit,
                        "Pending queue full before upstream opened, closing session"
                    );
                    self.teardown(
                        Some(CloseReason::new(CLOSE_PENDING_OVERFLOW, "Too many pending frames")),
                        None,
                    )
                }
                // The queue only seals on open, which leaves Connecting.
                Err(QueueError::Sealed(frame)) => vec![Action::SendUpstream(frame)],
            },
            RelayState::Relaying => vec![Action::SendUpstream(frame)],
            RelayState::Closed => {
                tracing::debug!(
                    session_id = %self.id,
                    state = self.state.as_str(),
                    bytes = frame.len(),
                    "Dropping client frame, upstream not open"
                );
                Vec::new()
            }
        }
    }

    /// The upstream handshake completed.
    ///
    /// Queued frames come back as `SendUpstream` actions in arrival order.
    pub fn on_upstream_open(&mut self) -> Vec<Action> {
        if self.state != RelayState::Connecting {
            return Vec::new();
        }
        self.upstream_open = true;
        self.state = RelayState::Relaying;

        let drained = self.pending.drain();
        tracing::debug!(
            session_id = %self.id,
            drained = drained.len(),
            "Upstream open, flushing pending frames"
        );
        drained.into_iter().map(Action::SendUpstream).collect()
    }

    /// A data frame arrived from the upstream.
    pub fn on_upstream_frame(&mut self, frame: Frame) -> Vec<Action> {
        if self.client_open {
            vec![Action::SendClient(frame)]
        } else {
            Vec::new()
        }
    }

    /// The upstream closed, or its stream ended.
    pub fn on_upstream_close(&mut self, close: Option<CloseReason>) -> Vec<Action> {
        self.upstream_open = false;
        self.teardown(close, None)
    }

    /// The client closed, or its stream ended.
    pub fn on_client_close(&mut self, close: Option<CloseReason>) -> Vec<Action> {
        self.client_open = false;
        self.teardown(None, close)
    }

    /// The upstream failed to connect, send or receive.
    pub fn on_upstream_error(&mut self, error: &dyn std::fmt::Display) -> Vec<Action> {
        tracing::warn!(
            session_id = %self.id,
            state = self.state.as_str(),
            error = %error,
            "Upstream error"
        );
        self.upstream_open = false;
        self.teardown(
            Some(CloseReason::new(CLOSE_UPSTREAM_FAILED, "Upstream connection failed")),
            None,
        )
    }

    /// The client connection failed.
    pub fn on_client_error(&mut self, error: &dyn std::fmt::Display) -> Vec<Action> {
        tracing::warn!(
            session_id = %self.id,
            state = self.state.as_str(),
            error = %error,
            "Client connection error"
        );
        self.client_open = false;
        self.teardown(None, None)
    }

    /// The process is shutting down.
    pub fn on_shutdown(&mut self) -> Vec<Action> {
        let close = CloseReason::new(CLOSE_GOING_AWAY, "Relay shutting down");
        self.teardown(Some(close.clone()), Some(close))
    }

    /// Close whichever sides are still open and move to `Closed`.
    ///
    /// `to_client` / `to_upstream` are what the respective side receives.
    fn teardown(
        &mut self,
        to_client: Option<CloseReason>,
        to_upstream: Option<CloseReason>,
    ) -> Vec<Action> {
        if self.state == RelayState::Closed {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.client_open {
            self.client_open = false;
            actions.push(Action::CloseClient(to_client));
        }
        if self.upstream_open {
            self.upstream_open = false;
            actions.push(Action::CloseUpstream(to_upstream));
        }
        self.state = RelayState::Closed;
        actions
    }
}
