use std::ops::Range;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info};

use crate::catalog::{clips, SheetId};
use crate::config::Timings;
use crate::context::AppContext;
use crate::events::{ButtonId, Gesture};
use crate::playback::accompany;

use super::{Reaction, StateKind};

/// Selectable dice, in selection order
const DICE: [(&str, u32); 7] = [
    ("d20", 20),
    ("d12", 12),
    ("d10", 10),
    ("d8", 8),
    ("d6", 6),
    ("d4", 4),
    ("d100", 100),
];

const PREVIEW_ROWS: Range<usize> = 0..4;
const REWIND_ROWS: [usize; 4] = [3, 2, 1, 0];
const REVEAL_ROWS: Range<usize> = 0..4;
const TAIL_ROWS: Range<usize> = 3..7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Selection,
    Result(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DiceBoard {
    selected: usize,
    mode: Mode,
}

/// Cue played after a roll landing on an extreme
fn bonus_cue(result: u32, max: u32) -> Option<&'static str> {
    if result == 1 {
        Some(clips::GUARDIAN_DOWN)
    } else if result == max {
        Some(clips::CRIT)
    } else {
        None
    }
}

/// Results sheet column showing `result`
fn result_column(result: u32) -> usize {
    result.saturating_sub(1) as usize
}

/// Die selection and rolling.
///
/// The board lock is only held to read or write the snapshot, never across
/// an animation: in cooperative mode the animation pumps the dispatcher.
pub struct DiceState {
    settle_until: Instant,
    board: Mutex<DiceBoard>,
}

impl DiceState {
    pub fn new(entered: Instant, timings: &Timings) -> Self {
        Self {
            settle_until: entered + timings.dice_settle,
            board: Mutex::new(DiceBoard {
                selected: 0,
                mode: Mode::Selection,
            }),
        }
    }

    fn snapshot(&self) -> DiceBoard {
        *self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut DiceBoard)) {
        f(&mut self.board.lock().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn run(&self, ctx: &AppContext) -> Option<StateKind> {
        let selected = self.snapshot().selected;
        info!(die = DICE[selected].0, "dice: selection");
        self.show_selection(ctx, selected);
        while ctx.pacer.wait(Duration::from_secs(1), true) {
            debug!("dice: waiting for input");
        }
        Some(StateKind::Idle)
    }

    pub fn handle_event(&self, gesture: Gesture, now: Instant, ctx: &AppContext) -> Reaction {
        if now < self.settle_until {
            debug!(%gesture, "dice: settling, ignored");
            return Reaction::Stay;
        }

        let board = self.snapshot();
        match (board.mode, gesture) {
            (_, Gesture::Double(ButtonId::B1)) => {
                ctx.signals.clear_stray_interrupt();
                debug!("dice: B1 double ignored");
            }
            (mode, Gesture::Double(ButtonId::B2)) => {
                ctx.signals.clear_stray_interrupt();
                if let Mode::Result(result) = mode {
                    self.play_tail(ctx, result);
                }
                self.update(|b| {
                    b.selected = 0;
                    b.mode = Mode::Selection;
                });
                info!(die = DICE[0].0, "dice: back to default die");
                self.show_selection(ctx, 0);
            }
            (Mode::Selection, Gesture::Tap(ButtonId::B1)) => self.roll(ctx, board.selected),
            (Mode::Selection, Gesture::Tap(ButtonId::B2)) => {
                ctx.animator
                    .play_rows(SheetId::Dice, board.selected, &REWIND_ROWS);
                let next = (board.selected + 1) % DICE.len();
                self.update(|b| b.selected = next);
                info!(die = DICE[next].0, "dice: next die");
                self.show_selection(ctx, next);
            }
            (Mode::Result(result), Gesture::Tap(ButtonId::B1)) => {
                self.play_tail(ctx, result);
                self.roll(ctx, board.selected);
            }
            (Mode::Result(result), Gesture::Tap(ButtonId::B2)) => {
                self.play_tail(ctx, result);
                self.update(|b| b.mode = Mode::Selection);
                self.show_selection(ctx, board.selected);
            }
            _ => debug!(%gesture, "dice: unhandled"),
        }
        Reaction::Stay
    }

    fn show_selection(&self, ctx: &AppContext, selected: usize) {
        ctx.animator
            .play_column(SheetId::Dice, selected, PREVIEW_ROWS, false, true);
    }

    fn play_tail(&self, ctx: &AppContext, result: u32) {
        ctx.animator
            .play_column(SheetId::Results, result_column(result), TAIL_ROWS, false, false);
    }

    fn roll(&self, ctx: &AppContext, selected: usize) {
        let (die, max) = DICE[selected];
        info!(die, "dice: rolling");
        accompany(&ctx.playback, &ctx.pacer, clips::ROLL, true, |_| {
            ctx.animator.play_column(
                SheetId::Dice,
                selected,
                PREVIEW_ROWS.end..SheetId::Dice.rows(),
                false,
                false,
            );
        });

        if ctx.pacer.cancelled(true) {
            info!(die, "dice: roll interrupted");
            self.update(|b| b.mode = Mode::Selection);
            self.show_selection(ctx, selected);
            return;
        }

        let result = ctx.with_rng(|rng| rng.random_range(1..=max));
        info!(die, result, "dice: result");
        ctx.animator
            .play_column(SheetId::Results, result_column(result), REVEAL_ROWS, false, true);
        self.update(|b| b.mode = Mode::Result(result));

        if let Some(cue) = bonus_cue(result, max) {
            ctx.playback.play(cue, true);
        }
    }
}
