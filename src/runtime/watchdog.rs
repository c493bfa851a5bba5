//! Idle-to-sleep watchdog

use std::time::{Duration, Instant};

use tracing::info;

use crate::state::StateKind;

/// Forces Idle into Sleep after a long stretch of continuous Idle
#[derive(Debug)]
pub struct IdleWatchdog {
    period: Duration,
    timeout: Duration,
    last_poll: Option<Instant>,
}

impl IdleWatchdog {
    pub fn new(period: Duration, timeout: Duration) -> Self {
        Self {
            period,
            timeout,
            last_poll: None,
        }
    }

    /// Check the current occupancy. `since` is when the active kind was
    /// entered from a different kind. Only evaluates once per period;
    /// returns `true` when Idle has lasted past the timeout.
    pub fn poll(&mut self, now: Instant, kind: StateKind, since: Instant) -> bool {
        if let Some(last) = self.last_poll {
            if now.saturating_duration_since(last) < self.period {
                return false;
            }
        }
        self.last_poll = Some(now);

        if kind != StateKind::Idle {
            return false;
        }
        let idle_for = now.saturating_duration_since(since);
        if idle_for >= self.timeout {
            info!(idle_secs = idle_for.as_secs(), "idle timeout, going to sleep");
            return true;
        }
        false
    }
}
