//! Display sink boundary

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, info, trace};

use crate::catalog::{Assets, FrameRef};

use super::HardwareError;

/// Something that can put one frame on the panel
pub trait DisplaySink: Send + Sync {
    /// Draw one frame. Synchronous and fast relative to the frame period.
    fn show(&self, frame: FrameRef) -> Result<(), HardwareError>;

    /// Tear the panel down and bring it back up
    fn reinit(&self) -> Result<(), HardwareError>;

    /// Release the panel at process exit
    fn release(&self);
}

/// Display that records frames in the log instead of drawing them
pub struct LogDisplay {
    assets: Assets,
    frames: AtomicU64,
    released: AtomicBool,
}

impl LogDisplay {
    pub fn new(assets: Assets) -> Self {
        info!(root = ?assets.root(), "using log display");
        Self {
            assets,
            frames: AtomicU64::new(0),
            released: AtomicBool::new(false),
        }
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl DisplaySink for LogDisplay {
    fn show(&self, frame: FrameRef) -> Result<(), HardwareError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(HardwareError::Display("display released".to_string()));
        }
        self.frames.fetch_add(1, Ordering::Relaxed);
        trace!(
            sheet = ?self.assets.sheet(frame.sheet),
            column = frame.column,
            row = frame.row,
            "frame"
        );
        Ok(())
    }

    fn reinit(&self) -> Result<(), HardwareError> {
        self.released.store(false, Ordering::SeqCst);
        debug!("log display reinitialised");
        Ok(())
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            info!(frames = self.frames_shown(), "log display released");
        }
    }
}
