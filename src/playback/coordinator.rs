//! Serialised audio sessions
//!
//! At most one clip plays system-wide. Starting a clip terminates whatever
//! was playing; callers wait on their own session and find it finished if it
//! was superseded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::catalog::Assets;
use crate::hw::{AudioBackend, AudioError, AudioStream, Board};
use crate::runtime::Pacer;

/// How a blocking [`PlaybackCoordinator::play`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The clip ran out, or another session replaced it
    Completed,
    /// Cancelled by the interrupt flag or shutdown
    Interrupted,
    /// Nothing played: missing clip or backend failure
    Skipped,
}

/// Handle to a session started by [`PlaybackCoordinator::start`]
#[derive(Debug)]
pub struct PlaybackSession {
    id: u64,
    clip: String,
    interruptable: bool,
}

struct ActiveSession {
    id: u64,
    clip: String,
    stream: Box<dyn AudioStream>,
}

pub struct PlaybackCoordinator {
    backend: Box<dyn AudioBackend>,
    board: Arc<dyn Board>,
    assets: Assets,
    pacer: Arc<Pacer>,
    chunk: Duration,
    active: Mutex<Option<ActiveSession>>,
    next_id: AtomicU64,
}

impl PlaybackCoordinator {
    pub fn new(
        backend: Box<dyn AudioBackend>,
        board: Arc<dyn Board>,
        assets: Assets,
        pacer: Arc<Pacer>,
        chunk: Duration,
    ) -> Self {
        Self {
            backend,
            board,
            assets,
            pacer,
            chunk,
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start `clip` without waiting, terminating any prior session.
    /// Returns `None` (after logging) if nothing could be started.
    pub fn start(&self, clip: &str, interruptable: bool) -> Option<PlaybackSession> {
        let path = self.assets.clip(clip);
        if let Err(e) = self.board.ensure_audio_clock() {
            debug!(?e, "audio clock check skipped");
        }

        let mut active = self.active();
        if let Some(mut prior) = active.take() {
            debug!(clip = %prior.clip, "terminating prior session");
            prior.stream.stop();
        }

        match self.backend.start(&path) {
            Ok(stream) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                info!(clip, interruptable, "playback started");
                *active = Some(ActiveSession {
                    id,
                    clip: clip.to_string(),
                    stream,
                });
                Some(PlaybackSession {
                    id,
                    clip: clip.to_string(),
                    interruptable,
                })
            }
            Err(AudioError::NotFound(path)) => {
                warn!(?path, "audio clip missing, skipping");
                None
            }
            Err(e) => {
                warn!(clip, error = %e, "playback failed, skipping");
                None
            }
        }
    }

    /// Whether `session` has finished. A superseded or stopped session
    /// counts as finished.
    pub fn poll(&self, session: &PlaybackSession) -> bool {
        let mut active = self.active();
        match active.as_mut() {
            Some(current) if current.id == session.id => {
                if current.stream.is_finished() {
                    debug!(clip = %current.clip, "playback finished");
                    *active = None;
                    true
                } else {
                    false
                }
            }
            _ => true,
        }
    }

    /// Stop `session` if it is still the one playing
    pub fn cancel(&self, session: &PlaybackSession) {
        let mut active = self.active();
        if active.as_ref().is_some_and(|current| current.id == session.id) {
            if let Some(mut current) = active.take() {
                info!(clip = %current.clip, "playback interrupted");
                current.stream.stop();
            }
        }
    }

    /// Block until `session` finishes, polling at audio-chunk granularity.
    /// An interruptable session is stopped when the interrupt flag rises.
    pub fn wait_for(&self, session: &PlaybackSession) -> PlayOutcome {
        loop {
            if self.poll(session) {
                return PlayOutcome::Completed;
            }
            if !self.pacer.wait(self.chunk, session.interruptable) {
                debug!(clip = %session.clip, "wait cancelled");
                self.cancel(session);
                return PlayOutcome::Interrupted;
            }
        }
    }

    /// Play `clip` to completion or cancellation
    pub fn play(&self, clip: &str, interruptable: bool) -> PlayOutcome {
        match self.start(clip, interruptable) {
            Some(session) => self.wait_for(&session),
            None => PlayOutcome::Skipped,
        }
    }

    /// Stop whatever is playing. No-op when idle.
    pub fn stop(&self) {
        if let Some(mut current) = self.active().take() {
            info!(clip = %current.clip, "playback stopped");
            current.stream.stop();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.active().is_some()
    }

    pub fn set_volume(&self, level: u8) {
        if let Err(e) = self.backend.set_volume(level) {
            warn!(level, error = %e, "volume change failed");
        }
    }
}
