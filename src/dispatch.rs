//! Global gesture rules and forwarding to the active state
//!
//! Each drain takes every queued gesture without blocking. Rules are applied
//! in a fixed order; a gesture no rule consumes is handed to the active
//! state. A failing or panicking state handler is logged and processing
//! carries on with the next gesture.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::catalog::clips;
use crate::context::AppContext;
use crate::events::{ButtonId, Gesture};
use crate::state::{Reaction, StateKind, StateManager};

pub struct Dispatcher {
    ctx: Arc<AppContext>,
    manager: Arc<StateManager>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<AppContext>, manager: Arc<StateManager>) -> Self {
        Self { ctx, manager }
    }

    /// Dispatch everything currently queued. Returns how many gestures
    /// were handled. Stops while a deferred transition is pending; the
    /// outgoing state gets nothing more and the queue is purged on entry.
    pub fn drain(&self) -> usize {
        let mut handled = 0;
        while !self.ctx.signals.transition_pending() {
            let Some(gesture) = self.ctx.queue.try_pop() else {
                break;
            };
            self.dispatch(gesture, Instant::now());
            handled += 1;
        }
        handled
    }

    pub fn dispatch(&self, gesture: Gesture, now: Instant) {
        let kind = self.manager.kind();
        let signals = &self.ctx.signals;
        debug!(%gesture, state = ?kind, "dispatching");

        match gesture {
            Gesture::Chord => {
                if kind == Some(StateKind::Sleep) {
                    debug!("chord ignored while asleep");
                    return;
                }
                let target = if kind == Some(StateKind::Dice) {
                    StateKind::Idle
                } else {
                    StateKind::Dice
                };
                self.manager.set_state(target);
                return;
            }
            Gesture::Hold(ButtonId::B1) => {
                let level = self.ctx.toggle_volume();
                debug!(level, "volume confirmation cue");
                self.ctx.playback.play(clips::BEEP, false);
                return;
            }
            Gesture::Hold(ButtonId::B2) => {
                self.manager.set_state(StateKind::Story);
                return;
            }
            Gesture::FiveTap(ButtonId::B1) if kind != Some(StateKind::Sleep) => {
                info!("going to sleep");
                signals.raise_interrupt();
                self.ctx.playback.play(clips::REVIVE, false);
                self.manager.set_state(StateKind::Sleep);
                return;
            }
            Gesture::FiveTap(ButtonId::B2) => {
                let guard = self.ctx.timings().hold_five_tap_guard;
                if let Some(since) = self.ctx.holds.since(ButtonId::B2, now) {
                    if since < guard {
                        info!(?since, "B2 five-tap right after a B2 hold, ignored");
                        return;
                    }
                }
                info!("shutdown requested by gesture");
                signals.raise_interrupt();
                self.ctx.playback.play(clips::GUARDIAN_DOWN, false);
                self.manager.set_state(StateKind::Shutdown);
                return;
            }
            Gesture::Double(_) if kind != Some(StateKind::Dice) => signals.raise_interrupt(),
            _ => {}
        }

        self.forward(gesture, now);
    }

    fn forward(&self, gesture: Gesture, now: Instant) {
        let Some(state) = self.manager.active() else {
            debug!(%gesture, "no active state, dropped");
            return;
        };
        let kind = state.kind();
        let handled = panic::catch_unwind(AssertUnwindSafe(|| {
            state.handle_event(gesture, now, &self.ctx)
        }));
        match handled {
            Ok(Ok(Reaction::Stay)) => {}
            Ok(Ok(Reaction::Goto(next))) => self.manager.set_state(next),
            Ok(Err(e)) => warn!(state = %kind, %gesture, error = %e, "state handler failed"),
            Err(_) => error!(state = %kind, %gesture, "state handler panicked"),
        }
    }
}
