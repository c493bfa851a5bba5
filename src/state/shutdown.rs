use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::context::AppContext;

use super::StateKind;

/// Terminal state: powers the prop off exactly once
#[derive(Default)]
pub struct ShutdownState {
    powered_off: AtomicBool,
}

impl ShutdownState {
    pub fn run(&self, ctx: &AppContext) -> Option<StateKind> {
        if !self.powered_off.swap(true, Ordering::SeqCst) {
            self.power_off(ctx);
        }
        while ctx.pacer.wait(Duration::from_millis(100), false) {}
        None
    }

    fn power_off(&self, ctx: &AppContext) {
        info!("shutdown: powering off");
        let board = &ctx.board;
        if let Err(e) = board.set_backlight(false) {
            warn!(error = %e, "shutdown: backlight off failed");
        }
        if let Err(e) = board.pulse_display_reset() {
            warn!(error = %e, "shutdown: display reset failed");
        }
        if let Err(e) = board.set_backlight(false) {
            warn!(error = %e, "shutdown: backlight off failed");
        }
        if let Err(e) = board.power_off() {
            error!(error = %e, "shutdown: power-off command failed");
        }
        ctx.signals.request_shutdown();
    }
}
