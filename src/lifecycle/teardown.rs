//! Orderly teardown
//!
//! Runs on fatal error or a termination signal: raise the shutdown and
//! interrupt flags, give the scheduler a bounded grace period to let the
//! active body return, then leave the hardware in a safe idle output.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::context::AppContext;

/// Bring everything down. `scheduler` is the blocking task running the
/// scheduler loop, if it is still alive.
pub async fn teardown(ctx: &Arc<AppContext>, scheduler: Option<JoinHandle<()>>) {
    info!("tearing down");
    ctx.signals.request_shutdown();
    ctx.signals.raise_interrupt();

    if let Some(handle) = scheduler {
        let grace = ctx.timings().teardown_grace;
        match tokio::time::timeout(grace, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "scheduler task failed"),
            Err(_) => warn!(?grace, "scheduler did not stop within grace period"),
        }
    }

    if ctx.playback.is_playing() {
        ctx.playback.stop();
    }
    if let Err(e) = ctx.board.set_backlight(false) {
        warn!(error = %e, "backlight off failed during teardown");
    }
    ctx.display().release();
    info!("teardown complete");
}
