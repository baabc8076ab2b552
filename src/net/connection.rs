//! Relay session identity and accounting.
//!
//! # Responsibilities
//! - Generate unique session IDs for tracing
//! - Enforce the concurrent session limit
//! - Let shutdown wait for live sessions to finish

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Global atomic counter for session IDs.
/// Relaxed ordering is enough: only uniqueness matters.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Generate a new unique session ID.
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ws-{}", self.0)
    }
}

/// Tracks live relay sessions against a fixed capacity.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    slots: Arc<Semaphore>,
    active_count: Arc<AtomicU64>,
    max_sessions: usize,
}

impl SessionTracker {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_sessions)),
            active_count: Arc::new(AtomicU64::new(0)),
            max_sessions,
        }
    }

    /// Claim a slot for a new session, or `None` when at capacity.
    ///
    /// The slot is released when the returned guard drops.
    pub fn try_track(&self) -> Option<SessionGuard> {
        let permit = self.slots.clone().try_acquire_owned().ok()?;
        self.active_count.fetch_add(1, Ordering::SeqCst);
        Some(SessionGuard {
            active_count: Arc::clone(&self.active_count),
            id: SessionId::new(),
            _permit: permit,
        })
    }

    /// Current live session count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Wait until every session has ended, or `grace` elapses.
    ///
    /// Returns `true` if all sessions drained in time.
    pub async fn wait_for_drain(&self, grace: Duration) -> bool {
        let drained = async {
            while self.active_count() > 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };
        tokio::time::timeout(grace, drained).await.is_ok()
    }
}

/// Held by a running session; releases its slot on drop.
#[derive(Debug)]
pub struct SessionGuard {
    active_count: Arc<AtomicU64>,
    id: SessionId,
    _permit: OwnedSemaphorePermit,
}

impl SessionGuard {
    /// Get this session's ID.
    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(session_id = %self.id, "Session slot released");
    }
}
