//! Behaviour states and the manager that switches between them
//!
//! Exactly one state is active at a time. Each state has a blocking run
//! body and reacts to gestures forwarded by the dispatcher:
//! - Boot: wake-up animation and cue, then Idle
//! - Idle: ambient loop; taps start a song or a quip
//! - Sing / Quip / Story: animation alongside one clip, then Idle
//! - Dice: die selection and rolls
//! - Sleep: backlight off until the wake gesture
//! - Shutdown: terminal power-off

mod boot;
mod dice;
mod idle;
mod manager;
mod perform;
mod shutdown;
mod sleep;

pub use manager::StateManager;

use std::time::Instant;

use tracing::warn;

use crate::context::AppContext;
use crate::events::Gesture;
use crate::hw::HardwareError;
use crate::selection::SelectionError;

use boot::BootState;
use dice::DiceState;
use idle::IdleState;
use perform::{Act, PerformState};
use shutdown::ShutdownState;
use sleep::SleepState;

/// The closed set of state kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    Boot,
    Idle,
    Sing,
    Quip,
    Dice,
    Story,
    Sleep,
    Shutdown,
}

impl std::fmt::Display for StateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateKind::Boot => write!(f, "Boot"),
            StateKind::Idle => write!(f, "Idle"),
            StateKind::Sing => write!(f, "Sing"),
            StateKind::Quip => write!(f, "Quip"),
            StateKind::Dice => write!(f, "Dice"),
            StateKind::Story => write!(f, "Story"),
            StateKind::Sleep => write!(f, "Sleep"),
            StateKind::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// What a state wants after handling a gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Stay,
    Goto(StateKind),
}

/// Failures surfaced from a state to the dispatcher or scheduler
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("hardware: {0}")]
    Hardware(#[from] HardwareError),

    #[error("selection: {0}")]
    Selection(#[from] SelectionError),
}

/// One live state instance
pub enum ActiveState {
    Boot(BootState),
    Idle(IdleState),
    Perform(PerformState),
    Dice(DiceState),
    Sleep(SleepState),
    Shutdown(ShutdownState),
}

impl ActiveState {
    pub fn new(kind: StateKind, ctx: &AppContext, entered: Instant) -> Self {
        let timings = ctx.timings();
        match kind {
            StateKind::Boot => ActiveState::Boot(BootState),
            StateKind::Idle => ActiveState::Idle(IdleState),
            StateKind::Sing => ActiveState::Perform(PerformState::new(Act::Sing)),
            StateKind::Quip => ActiveState::Perform(PerformState::new(Act::Quip)),
            StateKind::Story => ActiveState::Perform(PerformState::new(Act::Story)),
            StateKind::Dice => ActiveState::Dice(DiceState::new(entered, timings)),
            StateKind::Sleep => ActiveState::Sleep(SleepState::new(entered, timings)),
            StateKind::Shutdown => ActiveState::Shutdown(ShutdownState::default()),
        }
    }

    pub fn kind(&self) -> StateKind {
        match self {
            ActiveState::Boot(_) => StateKind::Boot,
            ActiveState::Idle(_) => StateKind::Idle,
            ActiveState::Perform(state) => state.act().kind(),
            ActiveState::Dice(_) => StateKind::Dice,
            ActiveState::Sleep(_) => StateKind::Sleep,
            ActiveState::Shutdown(_) => StateKind::Shutdown,
        }
    }

    /// Blocking body. Returns the successor it asks for, if any.
    pub fn run(&self, ctx: &AppContext) -> Option<StateKind> {
        match self {
            ActiveState::Boot(state) => state.run(ctx),
            ActiveState::Idle(state) => state.run(ctx),
            ActiveState::Perform(state) => match state.run(ctx) {
                Ok(next) => next,
                Err(e) => {
                    warn!(state = %self.kind(), error = %e, "performance failed");
                    Some(StateKind::Idle)
                }
            },
            ActiveState::Dice(state) => state.run(ctx),
            ActiveState::Sleep(state) => state.run(ctx),
            ActiveState::Shutdown(state) => state.run(ctx),
        }
    }

    /// React to one forwarded gesture
    pub fn handle_event(
        &self,
        gesture: Gesture,
        now: Instant,
        ctx: &AppContext,
    ) -> Result<Reaction, StateError> {
        match self {
            ActiveState::Boot(_) | ActiveState::Perform(_) | ActiveState::Shutdown(_) => {
                Ok(Reaction::Stay)
            }
            ActiveState::Idle(state) => Ok(state.handle_event(gesture)),
            ActiveState::Dice(state) => Ok(state.handle_event(gesture, now, ctx)),
            ActiveState::Sleep(state) => state.handle_event(gesture, now, ctx),
        }
    }
}
