use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::Timings;
use crate::context::AppContext;
use crate::events::{ButtonId, Gesture};

use super::{Reaction, StateError, StateKind};

const POLL: Duration = Duration::from_millis(50);

/// Button-1 taps counted towards a wake
#[derive(Debug, Default)]
struct WakeTaps {
    count: u32,
    last: Option<Instant>,
}

/// Backlight off until woken
pub struct SleepState {
    settle_until: Instant,
    window: Duration,
    taps: Mutex<WakeTaps>,
    wake: AtomicBool,
}

impl SleepState {
    pub fn new(entered: Instant, timings: &Timings) -> Self {
        Self {
            settle_until: entered + timings.sleep_settle,
            window: timings.sleep_wake_window,
            taps: Mutex::new(WakeTaps::default()),
            wake: AtomicBool::new(false),
        }
    }

    pub fn run(&self, ctx: &AppContext) -> Option<StateKind> {
        info!("sleep: backlight off");
        if let Err(e) = ctx.board.set_backlight(false) {
            debug!(error = %e, "sleep: backlight off failed");
        }
        loop {
            if self.wake.load(Ordering::SeqCst) {
                return Some(StateKind::Boot);
            }
            if !ctx.pacer.wait(POLL, true) && !self.wake.load(Ordering::SeqCst) {
                return None;
            }
        }
    }

    pub fn handle_event(
        &self,
        gesture: Gesture,
        now: Instant,
        ctx: &AppContext,
    ) -> Result<Reaction, StateError> {
        if now < self.settle_until {
            debug!(%gesture, "sleep: settling, ignored");
            return Ok(Reaction::Stay);
        }
        match gesture {
            Gesture::FiveTap(ButtonId::B1) => self.wake(ctx)?,
            Gesture::Tap(ButtonId::B1) => {
                if self.count_tap(now) {
                    self.wake(ctx)?;
                }
            }
            _ => debug!(%gesture, "sleep: ignored"),
        }
        Ok(Reaction::Stay)
    }

    /// Count one tap; true on the tap that completes the wake sequence
    fn count_tap(&self, now: Instant) -> bool {
        let mut taps = self.taps.lock().unwrap_or_else(PoisonError::into_inner);
        let within = taps
            .last
            .is_some_and(|last| now.saturating_duration_since(last) < self.window);
        taps.count = if within { taps.count + 1 } else { 1 };
        taps.last = Some(now);
        debug!(count = taps.count, "sleep: wake tap");
        if taps.count >= 5 {
            taps.count = 0;
            true
        } else {
            false
        }
    }

    /// Wake once. Later calls are no-ops. Hardware errors are reported after
    /// the wake has taken effect.
    fn wake(&self, ctx: &AppContext) -> Result<(), StateError> {
        if self.wake.swap(true, Ordering::SeqCst) {
            debug!("sleep: already waking");
            return Ok(());
        }
        info!("sleep: waking");
        let backlight = ctx.board.set_backlight(true);
        let display = ctx.display().reinit();
        ctx.signals.raise_interrupt();
        backlight?;
        display?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionModel;
    use crate::testing::{fast_timings, FakeAudio, TestRig};
    use std::sync::Arc;
    use std::thread;

    fn sleeping(rig: &TestRig) -> SleepState {
        SleepState::new(Instant::now(), rig.ctx.timings())
    }

    #[test]
    fn test_wakes_on_fifth_tap() {
        let rig = TestRig::new(ExecutionModel::Cooperative);
        let state = sleeping(&rig);
        let start = Instant::now();
        for i in 0..4 {
            let at = start + Duration::from_millis(100 * i);
            state
                .handle_event(Gesture::Tap(ButtonId::B1), at, &rig.ctx)
                .unwrap();
            assert!(!state.wake.load(Ordering::SeqCst));
        }
        state
            .handle_event(Gesture::Tap(ButtonId::B1), start + Duration::from_millis(400), &rig.ctx)
            .unwrap();
        assert!(state.wake.load(Ordering::SeqCst));
        assert!(rig.ctx.signals.interrupted());
        assert_eq!(rig.board.backlight_history(), vec![true]);
        assert_eq!(rig.display.reinits(), 1);
    }

    #[test]
    fn test_slow_taps_restart_count() {
        let rig = TestRig::new(ExecutionModel::Cooperative);
        let state = sleeping(&rig);
        let start = Instant::now();
        for i in 0..10 {
            let at = start + Duration::from_millis(700 * i);
            state
                .handle_event(Gesture::Tap(ButtonId::B1), at, &rig.ctx)
                .unwrap();
        }
        assert!(!state.wake.load(Ordering::SeqCst));
    }

    #[test]
    fn test_b2_taps_do_not_count() {
        let rig = TestRig::new(ExecutionModel::Cooperative);
        let state = sleeping(&rig);
        let start = Instant::now();
        for i in 0..5 {
            let at = start + Duration::from_millis(50 * i);
            state
                .handle_event(Gesture::Tap(ButtonId::B2), at, &rig.ctx)
                .unwrap();
        }
        assert!(!state.wake.load(Ordering::SeqCst));
    }

    #[test]
    fn test_wake_is_idempotent() {
        let rig = TestRig::new(ExecutionModel::Cooperative);
        let state = sleeping(&rig);
        let now = Instant::now();
        state
            .handle_event(Gesture::FiveTap(ButtonId::B1), now, &rig.ctx)
            .unwrap();
        state
            .handle_event(Gesture::FiveTap(ButtonId::B1), now, &rig.ctx)
            .unwrap();
        assert_eq!(rig.display.reinits(), 1);
        assert_eq!(rig.board.backlight_history(), vec![true]);
    }

    #[test]
    fn test_settle_window_ignores_wake() {
        let timings = Timings {
            sleep_settle: Duration::from_secs(5),
            ..fast_timings()
        };
        let rig = TestRig::with(
            ExecutionModel::Cooperative,
            timings,
            FakeAudio::new(Duration::from_millis(5)),
        );
        let state = sleeping(&rig);
        state
            .handle_event(Gesture::FiveTap(ButtonId::B1), Instant::now(), &rig.ctx)
            .unwrap();
        assert!(!state.wake.load(Ordering::SeqCst));
    }

    #[test]
    fn test_run_turns_off_backlight_and_boots_on_wake() {
        let rig = TestRig::new(ExecutionModel::Threaded);
        let state = Arc::new(sleeping(&rig));
        let ctx = rig.ctx.clone();
        let body = {
            let state = Arc::clone(&state);
            thread::spawn(move || state.run(&ctx))
        };
        thread::sleep(Duration::from_millis(20));
        state
            .handle_event(Gesture::FiveTap(ButtonId::B1), Instant::now(), &rig.ctx)
            .unwrap();
        assert_eq!(body.join().unwrap(), Some(StateKind::Boot));
        assert_eq!(rig.board.backlight_history(), vec![false, true]);
    }

    #[test]
    fn test_run_returns_on_interrupt() {
        let rig = TestRig::new(ExecutionModel::Threaded);
        let state = Arc::new(sleeping(&rig));
        let ctx = rig.ctx.clone();
        let body = {
            let state = Arc::clone(&state);
            thread::spawn(move || state.run(&ctx))
        };
        thread::sleep(Duration::from_millis(20));
        rig.ctx.signals.raise_interrupt();
        assert_eq!(body.join().unwrap(), None);
    }
}
