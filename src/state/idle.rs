use rand::Rng;
use tracing::{debug, info};

use crate::catalog::SheetId;
use crate::context::AppContext;
use crate::events::{ButtonId, Gesture};

use super::{Reaction, StateKind};

/// Ambient loop over random idle columns
pub struct IdleState;

impl IdleState {
    pub fn run(&self, ctx: &AppContext) -> Option<StateKind> {
        let sheet = SheetId::Idle;
        while !ctx.pacer.cancelled(true) {
            let column = ctx.with_rng(|rng| rng.random_range(0..sheet.columns()));
            debug!(column, "idle: choosing column");
            ctx.animator.play_column(sheet, column, 0..sheet.rows(), true, false);
        }
        None
    }

    pub fn handle_event(&self, gesture: Gesture) -> Reaction {
        match gesture {
            Gesture::Tap(ButtonId::B1) => {
                info!("idle: B1 tap, singing");
                Reaction::Goto(StateKind::Sing)
            }
            Gesture::Tap(ButtonId::B2) => {
                info!("idle: B2 tap, quip");
                Reaction::Goto(StateKind::Quip)
            }
            _ => Reaction::Stay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionModel;
    use crate::testing::TestRig;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_taps_pick_performance() {
        let idle = IdleState;
        assert_eq!(
            idle.handle_event(Gesture::Tap(ButtonId::B1)),
            Reaction::Goto(StateKind::Sing)
        );
        assert_eq!(
            idle.handle_event(Gesture::Tap(ButtonId::B2)),
            Reaction::Goto(StateKind::Quip)
        );
        assert_eq!(idle.handle_event(Gesture::Double(ButtonId::B1)), Reaction::Stay);
    }

    #[test]
    fn test_loops_until_interrupted() {
        let rig = TestRig::new(ExecutionModel::Threaded);
        let ctx = rig.ctx.clone();
        let body = thread::spawn(move || IdleState.run(&ctx));
        thread::sleep(Duration::from_millis(60));
        rig.ctx.signals.raise_interrupt();
        assert_eq!(body.join().unwrap(), None);

        let frames = rig.display.frames();
        assert!(!frames.is_empty());
        assert!(frames
            .iter()
            .all(|f| f.sheet == SheetId::Idle && f.column < 5));
    }
}
