//! Process-wide cancellation flags

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

/// Interrupt and shutdown flags shared by every execution context.
///
/// The interrupt flag is the only way one context asks another to abandon
/// what it is doing; it is checked at frame and audio-chunk granularity.
#[derive(Debug, Clone, Default)]
pub struct Signals {
    interrupt: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    transition: Arc<AtomicBool>,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise_interrupt(&self) {
        if !self.interrupt.swap(true, Ordering::SeqCst) {
            debug!("interrupt raised");
        }
    }

    pub fn clear_interrupt(&self) {
        self.interrupt.store(false, Ordering::SeqCst);
    }

    pub fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// Clear an interrupt that no pending transition or shutdown relies on.
    /// Returns whether a raised flag was cleared.
    pub fn clear_stray_interrupt(&self) -> bool {
        if self.transition_pending() || self.shutting_down() {
            return false;
        }
        self.interrupt.swap(false, Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Shared handle for loops that only care about shutdown
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub(crate) fn set_transition_pending(&self, pending: bool) {
        self.transition.store(pending, Ordering::SeqCst);
    }

    pub fn transition_pending(&self) -> bool {
        self.transition.load(Ordering::SeqCst)
    }
}
