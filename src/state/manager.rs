//! Owns the active state and the transition protocol
//!
//! A transition raises the interrupt flag, waits for the previous body to
//! finish when it runs on another thread, clears the flag, purges queued
//! gestures and starts the new state. Bodies run on a `state-<name>` worker
//! thread in threaded mode, or inline from [`StateManager::tick`] in
//! cooperative mode.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::ExecutionModel;
use crate::context::AppContext;

use super::{ActiveState, StateKind};

#[derive(Default)]
struct Slot {
    active: Option<Arc<ActiveState>>,
    /// When the current kind was entered; restarts of the same kind keep it
    entered: Option<Instant>,
    worker: Option<JoinHandle<Option<StateKind>>>,
    /// A body is waiting to be run inline
    ready: bool,
    inline_running: bool,
    /// Transition asked for while an inline body was running
    requested: Option<StateKind>,
}

pub struct StateManager {
    ctx: Arc<AppContext>,
    /// Serialises whole transitions
    transition: Mutex<()>,
    slot: Mutex<Slot>,
}

impl StateManager {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            transition: Mutex::new(()),
            slot: Mutex::new(Slot::default()),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn kind(&self) -> Option<StateKind> {
        self.slot().active.as_ref().map(|state| state.kind())
    }

    pub fn active(&self) -> Option<Arc<ActiveState>> {
        self.slot().active.clone()
    }

    /// Current kind and when it was entered
    pub fn occupancy(&self) -> Option<(StateKind, Instant)> {
        let slot = self.slot();
        let kind = slot.active.as_ref()?.kind();
        Some((kind, slot.entered?))
    }

    /// Switch to `next`. Refused once Shutdown is active. While an inline
    /// body is running the request is deferred until that body returns.
    pub fn set_state(&self, next: StateKind) {
        let _transition = self
            .transition
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let (from, worker) = {
            let mut slot = self.slot();
            let from = slot.active.as_ref().map(|state| state.kind());
            if from == Some(StateKind::Shutdown) {
                warn!(to = %next, "transition refused, shutting down");
                return;
            }
            self.ctx.signals.raise_interrupt();
            if slot.inline_running {
                // Gestures queued for the outgoing state die with it
                let purged = self.ctx.queue.purge();
                debug!(to = %next, purged, "transition deferred until the running body returns");
                slot.requested = Some(next);
                self.ctx.signals.set_transition_pending(true);
                return;
            }
            (from, slot.worker.take())
        };

        if let Some(worker) = worker {
            if worker.thread().id() != thread::current().id() && worker.join().is_err() {
                error!("state worker panicked");
            }
        }

        let signals = &self.ctx.signals;
        signals.clear_interrupt();
        signals.set_transition_pending(false);
        let purged = self.ctx.queue.purge();

        let now = Instant::now();
        let state = Arc::new(ActiveState::new(next, &self.ctx, now));
        match from {
            Some(from) => info!(from = %from, to = %next, purged, "state transition"),
            None => info!(to = %next, "initial state"),
        }

        let mut slot = self.slot();
        if from != Some(next) || slot.entered.is_none() {
            slot.entered = Some(now);
        }
        slot.active = Some(Arc::clone(&state));
        slot.ready = false;

        match self.ctx.pacer.model() {
            ExecutionModel::Threaded => {
                let ctx = Arc::clone(&self.ctx);
                let spawned = thread::Builder::new()
                    .name(format!("state-{}", next.to_string().to_lowercase()))
                    .spawn(move || state.run(&ctx));
                match spawned {
                    Ok(handle) => slot.worker = Some(handle),
                    Err(e) => {
                        warn!(?e, state = %next, "failed to spawn state worker, running inline");
                        slot.ready = true;
                    }
                }
            }
            ExecutionModel::Cooperative => slot.ready = true,
        }
    }

    /// One scheduler turn: reap a finished worker, then run a pending
    /// inline body to completion.
    pub fn tick(&self) {
        let finished = {
            let mut slot = self.slot();
            let done = slot
                .worker
                .as_ref()
                .is_some_and(|worker| worker.is_finished());
            if done {
                let kind = slot.active.as_ref().map(|state| state.kind());
                slot.worker.take().zip(kind)
            } else {
                None
            }
        };

        if let Some((worker, kind)) = finished {
            let next = match worker.join() {
                Ok(next) => next,
                Err(_) => {
                    error!(state = %kind, "state body panicked");
                    None
                }
            };
            self.advance(kind, next);
        }

        self.run_inline();
    }

    fn run_inline(&self) {
        let state = {
            let mut slot = self.slot();
            if !slot.ready || slot.inline_running {
                return;
            }
            let Some(state) = slot.active.clone() else {
                return;
            };
            slot.ready = false;
            slot.inline_running = true;
            state
        };

        let kind = state.kind();
        let next = match panic::catch_unwind(AssertUnwindSafe(|| state.run(&self.ctx))) {
            Ok(next) => next,
            Err(_) => {
                error!(state = %kind, "state body panicked");
                None
            }
        };

        let requested = {
            let mut slot = self.slot();
            slot.inline_running = false;
            slot.requested.take()
        };
        self.advance(kind, requested.or(next));
    }

    /// Honour a finished body's successor. No successor restarts the same
    /// kind, except Shutdown which just stays.
    fn advance(&self, finished: StateKind, next: Option<StateKind>) {
        if self.ctx.signals.shutting_down() {
            debug!(state = %finished, "body returned during shutdown");
            return;
        }
        match next {
            Some(next) => self.set_state(next),
            None if finished == StateKind::Shutdown => {}
            None => {
                debug!(state = %finished, "body returned without successor, restarting");
                self.set_state(finished);
            }
        }
    }

    /// Wait up to `grace` for the worker to exit after shutdown was
    /// requested.
    pub fn wind_down(&self, grace: Duration) {
        let Some(worker) = self.slot().worker.take() else {
            return;
        };
        let deadline = Instant::now() + grace;
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        if !worker.is_finished() {
            warn!(?grace, "state worker still running after grace period, detaching");
        } else if worker.join().is_err() {
            error!("state worker panicked during wind-down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ButtonId, Gesture};
    use crate::runtime::Pump;
    use crate::testing::TestRig;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Weak;

    fn manager(rig: &TestRig) -> Arc<StateManager> {
        Arc::new(StateManager::new(Arc::clone(&rig.ctx)))
    }

    #[test]
    fn test_transition_purges_queue() {
        for model in [ExecutionModel::Threaded, ExecutionModel::Cooperative] {
            let rig = TestRig::new(model);
            let manager = manager(&rig);
            rig.ctx.queue.push(Gesture::Tap(ButtonId::B1));
            rig.ctx.queue.push(Gesture::Chord);

            manager.set_state(StateKind::Idle);
            assert!(rig.ctx.queue.is_empty());
            assert_eq!(manager.kind(), Some(StateKind::Idle));
            assert!(!rig.ctx.signals.interrupted());

            rig.ctx.signals.request_shutdown();
            manager.wind_down(Duration::from_secs(1));
        }
    }

    #[test]
    fn test_shutdown_refuses_transitions() {
        let rig = TestRig::new(ExecutionModel::Cooperative);
        let manager = manager(&rig);
        manager.set_state(StateKind::Shutdown);
        manager.set_state(StateKind::Idle);
        assert_eq!(manager.kind(), Some(StateKind::Shutdown));
    }

    #[test]
    fn test_shutdown_body_powers_off_and_stops() {
        let rig = TestRig::new(ExecutionModel::Cooperative);
        let manager = manager(&rig);
        manager.set_state(StateKind::Shutdown);
        manager.tick();
        manager.tick();
        assert_eq!(rig.board.power_offs(), 1);
        assert!(rig.ctx.signals.shutting_down());
        assert_eq!(manager.kind(), Some(StateKind::Shutdown));
    }

    #[test]
    fn test_body_without_successor_restarts_same_kind() {
        let rig = TestRig::new(ExecutionModel::Cooperative);
        let manager = manager(&rig);
        manager.set_state(StateKind::Idle);
        let (_, entered) = manager.occupancy().unwrap();
        let first = manager.active().unwrap();

        rig.ctx.signals.raise_interrupt();
        manager.tick();

        let (kind, since) = manager.occupancy().unwrap();
        assert_eq!(kind, StateKind::Idle);
        assert_eq!(since, entered);
        assert!(!Arc::ptr_eq(&first, &manager.active().unwrap()));
        assert!(!rig.ctx.signals.interrupted());
    }

    struct RequestDice {
        manager: Weak<StateManager>,
        fired: AtomicBool,
    }

    impl Pump for RequestDice {
        fn pump(&self) {
            if !self.fired.swap(true, Ordering::SeqCst) {
                if let Some(manager) = self.manager.upgrade() {
                    manager.set_state(StateKind::Dice);
                }
            }
        }
    }

    #[test]
    fn test_request_during_inline_body_is_deferred() {
        let rig = TestRig::new(ExecutionModel::Cooperative);
        let manager = manager(&rig);
        let pump = Arc::new(RequestDice {
            manager: Arc::downgrade(&manager),
            fired: AtomicBool::new(false),
        });
        let weak: Weak<dyn Pump> = Arc::downgrade(&pump) as Weak<dyn Pump>;
        rig.ctx.pacer.attach_pump(weak);

        manager.set_state(StateKind::Idle);
        manager.tick();

        assert!(pump.fired.load(Ordering::SeqCst));
        assert_eq!(manager.kind(), Some(StateKind::Dice));
        assert!(!rig.ctx.signals.transition_pending());
        assert!(!rig.ctx.signals.interrupted());
    }

    #[test]
    fn test_threaded_boot_advances_to_idle() {
        let rig = TestRig::new(ExecutionModel::Threaded);
        let manager = manager(&rig);
        manager.set_state(StateKind::Boot);

        let deadline = Instant::now() + Duration::from_secs(5);
        while manager.kind() != Some(StateKind::Idle) && Instant::now() < deadline {
            manager.tick();
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(manager.kind(), Some(StateKind::Idle));
        assert!(rig.audio.started().contains(&crate::catalog::clips::BOOT.to_string()));

        rig.ctx.signals.request_shutdown();
        manager.wind_down(Duration::from_secs(1));
    }
}
