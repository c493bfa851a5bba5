//! Animation alongside audio
//!
//! A foreground loop (the animation) runs while one clip plays. The loop
//! looks at the [`AudioCell`] only at segment boundaries, so finishing audio
//! never cuts a segment short; the interrupt flag still ends it at the next
//! frame.
//!
//! Threaded mode plays the clip on a scoped thread. Cooperative mode starts
//! a session and polls it from the foreground.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::warn;

use crate::config::ExecutionModel;
use crate::runtime::Pacer;

use super::coordinator::{PlayOutcome, PlaybackCoordinator, PlaybackSession};

/// Completion state of the accompanying clip
pub struct AudioCell<'a> {
    done: AtomicBool,
    session: Option<PlaybackSession>,
    playback: &'a PlaybackCoordinator,
}

impl AudioCell<'_> {
    /// Whether the clip has finished on its own (or could not play at all)
    pub fn is_done(&self) -> bool {
        if self.done.load(Ordering::SeqCst) {
            return true;
        }
        if let Some(session) = &self.session {
            if self.playback.poll(session) {
                self.done.store(true, Ordering::SeqCst);
            }
        }
        self.done.load(Ordering::SeqCst)
    }

    fn finish(&self, outcome: PlayOutcome) {
        if outcome != PlayOutcome::Interrupted {
            self.done.store(true, Ordering::SeqCst);
        }
    }
}

/// Run `body` while `clip` plays. Returns once both have finished.
pub fn accompany<R>(
    playback: &PlaybackCoordinator,
    pacer: &Pacer,
    clip: &str,
    interruptable: bool,
    body: impl FnOnce(&AudioCell<'_>) -> R,
) -> R {
    match pacer.model() {
        ExecutionModel::Threaded => {
            let cell = AudioCell {
                done: AtomicBool::new(false),
                session: None,
                playback,
            };
            thread::scope(|scope| {
                let spawned = thread::Builder::new()
                    .name("audio".to_string())
                    .spawn_scoped(scope, || {
                        cell.finish(playback.play(clip, interruptable));
                    });
                if let Err(e) = spawned {
                    warn!(?e, clip, "failed to spawn audio thread, continuing silent");
                    cell.finish(PlayOutcome::Skipped);
                }
                body(&cell)
            })
        }
        ExecutionModel::Cooperative => {
            let session = playback.start(clip, interruptable);
            let cell = AudioCell {
                done: AtomicBool::new(session.is_none()),
                session,
                playback,
            };
            let result = body(&cell);
            if let Some(session) = &cell.session {
                cell.finish(playback.wait_for(session));
            }
            result
        }
    }
}
