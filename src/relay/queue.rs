//! Pending message queue.
//!
//! Holds client frames while the upstream handshake is in flight. Frames
//! are appended in arrival order, drained exactly once when the upstream
//! opens, and the queue is sealed afterwards: every later push is refused
//! so the caller has to forward directly.

use std::collections::VecDeque;

use thiserror::Error;

use crate::relay::frame::Frame;

/// Why a frame could not be queued. The frame is handed back.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("pending queue already drained")]
    Sealed(Frame),

    #[error("pending queue full ({limit} frames)")]
    Full { frame: Frame, limit: usize },
}

#[derive(Debug)]
pub struct PendingQueue {
    frames: VecDeque<Frame>,
    limit: usize,
    sealed: bool,
}

impl PendingQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            limit,
            sealed: false,
        }
    }

    /// Append a frame behind everything already queued.
    pub fn push(&mut self, frame: Frame) -> Result<(), QueueError> {
        if self.sealed {
            return Err(QueueError::Sealed(frame));
        }
        if self.frames.len() >= self.limit {
            return Err(QueueError::Full {
                frame,
                limit: self.limit,
            });
        }
        self.frames.push_back(frame);
        Ok(())
    }

    /// Take every queued frame in FIFO order and seal the queue.
    ///
    /// A second drain returns nothing.
    pub fn drain(&mut self) -> Vec<Frame> {
        self.sealed = true;
        self.frames.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}
