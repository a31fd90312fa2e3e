//! Producer→loop frame handoff.
//!
//! Capacity is fixed at one frame, so `onFrame` backpressure reaches
//! the transport directly: a producer blocks (or fails `try_send`)
//! until the loop thread has taken the previous frame. Nothing ever
//! queues unbounded.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use thiserror::Error;

use crate::format::OwnedFrame;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandoffError {
    /// The loop side is gone; the producer should stop.
    #[error("frame handoff closed")]
    Closed,
    /// The single slot is still occupied (backpressure).
    #[error("frame handoff full")]
    Full,
}

/// Transport-facing half; owned by the frame-producing thread.
pub struct FrameProducer {
    tx: Sender<OwnedFrame>,
}

impl FrameProducer {
    /// Blocks until the slot is free, throttling the producer to the
    /// backend's pace.
    pub fn send(&self, frame: OwnedFrame) -> Result<(), HandoffError> {
        self.tx.send(frame).map_err(|_| HandoffError::Closed)
    }

    /// Non-blocking variant for producers that drop frames instead of
    /// stalling.
    pub fn try_send(&self, frame: OwnedFrame) -> Result<(), HandoffError> {
        self.tx.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => HandoffError::Full,
            TrySendError::Disconnected(_) => HandoffError::Closed,
        })
    }
}

/// Loop-facing half; owned by the backend's thread.
pub struct FrameConsumer {
    rx: Receiver<OwnedFrame>,
}

impl FrameConsumer {
    /// Next frame, waiting at most `timeout`. `None` on timeout or when
    /// the producer is gone.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<OwnedFrame> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<OwnedFrame> {
        self.rx.try_recv().ok()
    }
}

/// Builds the two halves of a single-slot handoff.
pub fn frame_handoff() -> (FrameProducer, FrameConsumer) {
    let (tx, rx) = bounded(1);
    (FrameProducer { tx }, FrameConsumer { rx })
}
