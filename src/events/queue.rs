//! FIFO of classified gestures
//!
//! The classifier pushes at decision time; the dispatcher drains without
//! blocking; transitions purge whatever is left.

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

use super::Gesture;

/// Unbounded gesture queue shared by the input side and the dispatcher
#[derive(Clone)]
pub struct EventQueue {
    tx: Sender<Gesture>,
    rx: Receiver<Gesture>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn push(&self, gesture: Gesture) {
        // Both ends live in this struct, so the channel cannot be disconnected
        let _ = self.tx.send(gesture);
    }

    /// Non-blocking pop of the oldest gesture
    pub fn try_pop(&self) -> Option<Gesture> {
        self.rx.try_recv().ok()
    }

    /// Drop everything currently queued, returning how many were dropped
    pub fn purge(&self) -> usize {
        let dropped = self.rx.try_iter().count();
        if dropped > 0 {
            debug!(dropped, "purged queued gestures");
        }
        dropped
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }
}
