use rand::Rng;
use tracing::{debug, info};

use crate::catalog::{clips, SheetId};
use crate::context::AppContext;
use crate::playback::accompany;

use super::{StateError, StateKind};

/// Which performance a [`PerformState`] gives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Act {
    Sing,
    Quip,
    Story,
}

impl Act {
    pub fn kind(self) -> StateKind {
        match self {
            Act::Sing => StateKind::Sing,
            Act::Quip => StateKind::Quip,
            Act::Story => StateKind::Story,
        }
    }

    fn sheet(self) -> SheetId {
        match self {
            Act::Sing => SheetId::Sing,
            Act::Quip | Act::Story => SheetId::Active,
        }
    }
}

/// One clip with animation segments cycling alongside it
pub struct PerformState {
    act: Act,
}

impl PerformState {
    pub fn new(act: Act) -> Self {
        Self { act }
    }

    pub fn act(&self) -> Act {
        self.act
    }

    fn pick_clip(&self, ctx: &AppContext) -> Result<&'static str, StateError> {
        let clip = match self.act {
            Act::Sing => ctx.with_rng(|rng| ctx.pools().next_song(rng))?,
            Act::Quip => ctx.with_rng(|rng| ctx.pools().quips.next(rng)),
            Act::Story => clips::STORY,
        };
        Ok(clip)
    }

    fn pick_column(&self, ctx: &AppContext) -> usize {
        ctx.with_rng(|rng| match self.act {
            Act::Sing => ctx.pools().sing_columns.next(rng),
            Act::Quip => ctx.pools().quip_columns.next(rng),
            Act::Story => rng.random_range(0..self.act.sheet().columns()),
        })
    }

    /// Cycle segments until the clip is done or the interrupt fires. A
    /// segment in progress when the clip ends is always played out.
    pub fn run(&self, ctx: &AppContext) -> Result<Option<StateKind>, StateError> {
        let clip = self.pick_clip(ctx)?;
        let sheet = self.act.sheet();
        info!(act = ?self.act, clip, "performing");

        accompany(&ctx.playback, &ctx.pacer, clip, true, |audio| {
            let mut segments = 0usize;
            loop {
                let column = self.pick_column(ctx);
                ctx.animator.play_column(sheet, column, 0..sheet.rows(), true, false);
                segments += 1;
                if ctx.pacer.cancelled(true) {
                    debug!(segments, "performance interrupted");
                    break;
                }
                if audio.is_done() {
                    debug!(segments, "performance complete");
                    break;
                }
            }
        });
        Ok(Some(StateKind::Idle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionModel;
    use crate::testing::{fast_timings, FakeAudio, TestRig};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_first_song_is_billy() {
        let rig = TestRig::new(ExecutionModel::Cooperative);
        let sing = PerformState::new(Act::Sing);
        assert_eq!(sing.run(&rig.ctx).unwrap(), Some(StateKind::Idle));
        assert_eq!(sing.run(&rig.ctx).unwrap(), Some(StateKind::Idle));

        let started = rig.audio.started();
        assert_eq!(started[0], clips::FIRST_SONG);
        assert_ne!(started[1], clips::FIRST_SONG);
        assert!(rig.display.frames().iter().all(|f| f.sheet == SheetId::Sing));
    }

    #[test]
    fn test_segment_finishes_after_clip_ends() {
        // Clip ends well inside the first segment; that segment still plays out
        let rig = TestRig::with(
            ExecutionModel::Threaded,
            fast_timings(),
            FakeAudio::new(Duration::from_millis(2)),
        );
        let quip = PerformState::new(Act::Quip);
        assert_eq!(quip.run(&rig.ctx).unwrap(), Some(StateKind::Idle));

        let frames = rig.display.frames();
        assert_eq!(frames.len() % SheetId::Active.rows(), 0);
        assert!(frames.iter().all(|f| f.sheet == SheetId::Active));
        assert!(clips::QUIPS.contains(&rig.audio.started()[0].as_str()));
    }

    #[test]
    fn test_interrupt_abandons_immediately() {
        let rig = TestRig::with(
            ExecutionModel::Threaded,
            fast_timings(),
            FakeAudio::new(Duration::from_secs(30)),
        );
        let ctx = rig.ctx.clone();
        let body = thread::spawn(move || PerformState::new(Act::Story).run(&ctx));
        thread::sleep(Duration::from_millis(50));
        rig.ctx.signals.raise_interrupt();

        assert_eq!(body.join().unwrap().unwrap(), Some(StateKind::Idle));
        assert_eq!(rig.audio.started(), vec![clips::STORY.to_string()]);
        assert_eq!(rig.audio.stops(), 1);
    }

    #[test]
    fn test_missing_clip_plays_one_segment() {
        let rig = TestRig::with(
            ExecutionModel::Cooperative,
            fast_timings(),
            FakeAudio::new(Duration::from_millis(5)).missing(clips::STORY),
        );
        let story = PerformState::new(Act::Story);
        assert_eq!(story.run(&rig.ctx).unwrap(), Some(StateKind::Idle));
        assert_eq!(rig.display.frames().len(), SheetId::Active.rows());
    }
}
