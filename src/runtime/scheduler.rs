//! The scheduler loop
//!
//! Every tick services input and dispatch, checks the idle watchdog and lets
//! the state manager reap or run bodies. In cooperative mode the scheduler is
//! also the [`Pump`] that inline bodies call between frames, so input keeps
//! flowing while a body runs on the scheduler thread. Nested dispatch from a
//! pump is skipped; only input is serviced then.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use crate::context::AppContext;
use crate::dispatch::Dispatcher;
use crate::input::InputMonitor;
use crate::state::{StateKind, StateManager};

use super::{IdleWatchdog, Pump};

/// Resets the reentrancy flag when dispatch unwinds or returns
struct Servicing<'a>(&'a AtomicBool);

impl Drop for Servicing<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Scheduler {
    ctx: Arc<AppContext>,
    manager: Arc<StateManager>,
    dispatcher: Dispatcher,
    watchdog: Mutex<IdleWatchdog>,
    /// Present in cooperative mode; threaded mode runs it on its own thread
    monitor: Option<Mutex<InputMonitor>>,
    servicing: AtomicBool,
}

impl Scheduler {
    pub fn new(
        ctx: Arc<AppContext>,
        manager: Arc<StateManager>,
        dispatcher: Dispatcher,
        monitor: Option<InputMonitor>,
    ) -> Self {
        let timings = ctx.timings();
        let watchdog = IdleWatchdog::new(timings.watchdog_period, timings.idle_timeout);
        Self {
            manager,
            dispatcher,
            watchdog: Mutex::new(watchdog),
            monitor: monitor.map(Mutex::new),
            servicing: AtomicBool::new(false),
            ctx,
        }
    }

    pub fn manager(&self) -> &Arc<StateManager> {
        &self.manager
    }

    /// Poll input, then dispatch queued gestures and check the watchdog
    /// unless that is already in progress further up the stack.
    pub fn service(&self) {
        if let Some(monitor) = &self.monitor {
            if let Ok(mut monitor) = monitor.try_lock() {
                monitor.step(Duration::ZERO);
            }
        }

        if self.servicing.swap(true, Ordering::SeqCst) {
            return;
        }
        let _servicing = Servicing(&self.servicing);
        self.dispatcher.drain();
        self.check_watchdog();
    }

    fn check_watchdog(&self) {
        if self.ctx.signals.transition_pending() {
            return;
        }
        let Some((kind, since)) = self.manager.occupancy() else {
            return;
        };
        let expired = self
            .watchdog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .poll(Instant::now(), kind, since);
        if expired {
            self.manager.set_state(StateKind::Sleep);
        }
    }

    /// Boot, then loop until shutdown is requested
    pub fn run(&self) {
        let timings = self.ctx.timings();
        info!(model = ?self.ctx.pacer.model(), "scheduler started");
        self.manager.set_state(StateKind::Boot);

        while !self.ctx.signals.shutting_down() {
            self.service();
            self.manager.tick();
            thread::sleep(timings.scheduler_tick);
        }

        self.manager.wind_down(timings.teardown_grace);
        info!("scheduler stopped");
    }
}

impl Pump for Scheduler {
    fn pump(&self) {
        self.service();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionModel;
    use crate::events::Gesture;
    use crate::input::ScriptedButtons;
    use crate::testing::{fast_timings, FakeAudio, TestRig};
    use std::sync::Weak;

    fn scheduler(rig: &TestRig, monitor: Option<InputMonitor>) -> Arc<Scheduler> {
        let manager = Arc::new(StateManager::new(Arc::clone(&rig.ctx)));
        let dispatcher = Dispatcher::new(Arc::clone(&rig.ctx), Arc::clone(&manager));
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&rig.ctx),
            manager,
            dispatcher,
            monitor,
        ));
        let weak: Weak<dyn Pump> = Arc::downgrade(&scheduler) as Weak<dyn Pump>;
        rig.ctx.pacer.attach_pump(weak);
        scheduler
    }

    fn wait_for_state(scheduler: &Scheduler, kind: StateKind) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if scheduler.manager().kind() == Some(kind) {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_boot_idle_chord_dice() {
        for model in [ExecutionModel::Cooperative, ExecutionModel::Threaded] {
            let rig = TestRig::new(model);
            let scheduler = scheduler(&rig, None);
            let runner = {
                let scheduler = Arc::clone(&scheduler);
                thread::spawn(move || scheduler.run())
            };

            assert!(wait_for_state(&scheduler, StateKind::Idle), "{model:?}");
            rig.ctx.queue.push(Gesture::Chord);
            assert!(wait_for_state(&scheduler, StateKind::Dice), "{model:?}");

            rig.ctx.signals.request_shutdown();
            runner.join().unwrap();
        }
    }

    #[test]
    fn test_watchdog_puts_idle_to_sleep() {
        let timings = crate::config::Timings {
            idle_timeout: Duration::from_millis(20),
            watchdog_period: Duration::from_millis(1),
            ..fast_timings()
        };
        let rig = TestRig::with(
            ExecutionModel::Threaded,
            timings,
            FakeAudio::new(Duration::from_millis(5)),
        );
        let scheduler = scheduler(&rig, None);
        let runner = {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || scheduler.run())
        };

        assert!(wait_for_state(&scheduler, StateKind::Sleep));
        assert!(rig.board.backlight_history().contains(&false));

        rig.ctx.signals.request_shutdown();
        runner.join().unwrap();
    }

    #[test]
    fn test_hold_then_tap_lands_in_story_under_both_models() {
        for model in [ExecutionModel::Threaded, ExecutionModel::Cooperative] {
            let rig = TestRig::new(model);
            let scheduler = scheduler(&rig, None);
            let manager = Arc::clone(scheduler.manager());
            manager.set_state(StateKind::Idle);
            rig.ctx.queue.push(Gesture::Hold(crate::events::ButtonId::B2));
            rig.ctx.queue.push(Gesture::Tap(crate::events::ButtonId::B1));

            match model {
                // Dispatch on the scheduler thread while Idle runs on its worker
                ExecutionModel::Threaded => scheduler.service(),
                // Idle runs inline and dispatches from its own pump
                ExecutionModel::Cooperative => manager.tick(),
            }

            assert_eq!(manager.kind(), Some(StateKind::Story), "{model:?}");
            assert!(rig.ctx.queue.is_empty(), "{model:?}");
            assert!(!rig.ctx.signals.transition_pending(), "{model:?}");
            let started = rig.audio.started();
            assert!(!started.iter().any(|clip| clip.starts_with("songs/")), "{model:?}");

            rig.ctx.signals.request_shutdown();
            rig.ctx.signals.raise_interrupt();
            manager.wind_down(Duration::from_secs(1));
        }
    }

    #[test]
    fn test_cooperative_monitor_feeds_dispatch() {
        // A B1 tap once Idle is up: the inline Idle body pumps input and the
        // tap moves the prop into Sing
        let script = r#"
{"at_ms":300,"button":"b1","kind":"press"}
{"at_ms":340,"button":"b1","kind":"release"}
"#;
        let rig = TestRig::new(ExecutionModel::Cooperative);
        let ctx = &rig.ctx;
        let monitor = InputMonitor::new(
            ctx.timings().clone(),
            ctx.holds.clone(),
            ctx.queue.clone(),
            |_| Box::new(ScriptedButtons::from_reader(script.as_bytes()).unwrap()),
        );
        let scheduler = scheduler(&rig, Some(monitor));
        let runner = {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || scheduler.run())
        };

        assert!(wait_for_state(&scheduler, StateKind::Sing));
        let started = rig.audio.started();
        assert!(started.contains(&crate::catalog::clips::FIRST_SONG.to_string()));

        rig.ctx.signals.request_shutdown();
        runner.join().unwrap();
    }
}
