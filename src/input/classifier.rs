//! Edge-to-gesture classification
//!
//! Turns the raw press/release stream of both buttons into [`Gesture`]s:
//! debouncing, hold detection, tap tallies decided after a quiet window,
//! and two-button chords resolved on mutual release.
//!
//! The classifier never reads a clock itself. Every entry point takes the
//! current monotonic time so the same code runs against the hardware clock
//! and against the virtual clock used in tests.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::Timings;
use crate::events::{ButtonId, Edge, EdgeKind, Gesture};

/// Last time each button produced a hold, shared with the dispatcher
#[derive(Debug, Clone, Default)]
pub struct HoldStamps {
    inner: Arc<Mutex<[Option<Instant>; 2]>>,
}

impl HoldStamps {
    pub fn record(&self, button: ButtonId, at: Instant) {
        let mut stamps = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        stamps[button.index()] = Some(at);
    }

    /// Time elapsed since the last hold on `button`, if any
    pub fn since(&self, button: ButtonId, now: Instant) -> Option<Duration> {
        let stamps = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        stamps[button.index()].map(|at| now.saturating_duration_since(at))
    }
}

#[derive(Debug, Default, Clone)]
struct ButtonTrack {
    down: bool,
    pressed_at: Option<Instant>,
    taps: u32,
    decide_at: Option<Instant>,
    suppress_until: Option<Instant>,
}

impl ButtonTrack {
    fn clear_tally(&mut self) {
        self.taps = 0;
        self.decide_at = None;
    }
}

#[derive(Debug, Clone)]
struct ChordState {
    pending: bool,
    detected_at: Option<Instant>,
    armed: bool,
    last_resolved: Option<Instant>,
}

impl Default for ChordState {
    fn default() -> Self {
        Self {
            pending: false,
            detected_at: None,
            armed: true,
            last_resolved: None,
        }
    }
}

/// Per-button edge classifier with shared chord tracking
pub struct GestureClassifier {
    timings: Timings,
    tracks: [ButtonTrack; 2],
    chord: ChordState,
    holds: HoldStamps,
}

impl GestureClassifier {
    pub fn new(timings: Timings, holds: HoldStamps) -> Self {
        Self {
            timings,
            tracks: Default::default(),
            chord: ChordState::default(),
            holds,
        }
    }

    /// Whether the classifier believes `button` is currently held down
    pub fn is_down(&self, button: ButtonId) -> bool {
        self.tracks[button.index()].down
    }

    /// Feed one edge. Any gesture decided immediately (hold, chord) is
    /// appended to `out`.
    pub fn on_edge(&mut self, edge: Edge, now: Instant, out: &mut Vec<Gesture>) {
        match edge.kind {
            EdgeKind::Press => self.on_press(edge.button, edge.at, now),
            EdgeKind::Release => self.on_release(edge.button, edge.at, now, out),
        }
    }

    /// Fire tap decisions whose window elapsed and expire a stale chord.
    pub fn poll(&mut self, now: Instant, out: &mut Vec<Gesture>) {
        for button in ButtonId::ALL {
            let track = &mut self.tracks[button.index()];
            let Some(deadline) = track.decide_at else {
                continue;
            };
            // A press in progress at the deadline extends the sequence; its
            // release decides
            if now < deadline || track.down {
                continue;
            }

            let taps = track.taps;
            track.clear_tally();

            if Self::within(self.chord.last_resolved, now, self.timings.post_chord_suppress) {
                info!(%button, taps, "tap decision suppressed after chord");
                continue;
            }

            let gesture = match taps {
                0 => None,
                1 => Some(Gesture::Tap(button)),
                2..=4 => Some(Gesture::Double(button)),
                _ => Some(Gesture::FiveTap(button)),
            };
            match gesture {
                Some(gesture) => {
                    info!(%button, taps, %gesture, "tap decision");
                    out.push(gesture);
                }
                None => debug!(%button, "tap decision with empty tally"),
            }
        }

        if self.chord.pending {
            let stale = self
                .chord
                .detected_at
                .is_some_and(|at| now.saturating_duration_since(at) > self.timings.chord_timeout);
            if stale {
                info!("chord timeout, discarding pending chord");
                self.chord.pending = false;
                self.chord.detected_at = None;
                // Detection re-arms only once both buttons are seen up
                self.chord.armed = !self.is_down(ButtonId::B1) && !self.is_down(ButtonId::B2);
            }
        }
    }

    fn on_press(&mut self, button: ButtonId, at: Instant, now: Instant) {
        let track = &mut self.tracks[button.index()];
        if track.down {
            debug!(%button, "press while already down, restarting pulse");
        }
        track.down = true;
        track.pressed_at = Some(at);
        info!(%button, "press");

        let other = &self.tracks[button.other().index()];
        if let (true, Some(other_at)) = (other.down, other.pressed_at) {
            let dt = if at >= other_at { at - other_at } else { other_at - at };
            if dt <= self.timings.chord_grace && self.chord.armed {
                info!(dt_ms = dt.as_millis() as u64, "chord pending, waiting for release");
                self.chord.pending = true;
                self.chord.detected_at = Some(now);
                self.chord.armed = false;
            }
        }
    }

    fn on_release(&mut self, button: ButtonId, at: Instant, now: Instant, out: &mut Vec<Gesture>) {
        let track = &mut self.tracks[button.index()];
        let Some(pressed_at) = track.pressed_at else {
            warn!(%button, was_down = track.down, "release without recorded press, forcing release");
            track.down = false;
            track.clear_tally();
            return;
        };

        let at = if at < pressed_at {
            debug!(%button, "stale release timestamp, clamping to press time");
            pressed_at
        } else {
            at
        };
        let pulse = at - pressed_at;
        track.down = false;
        track.pressed_at = None;
        info!(%button, pulse_ms = pulse.as_millis() as u64, "release");

        if !self.is_down(ButtonId::B1) && !self.is_down(ButtonId::B2) {
            if self.chord.pending {
                info!("chord released");
                out.push(Gesture::Chord);
                for track in &mut self.tracks {
                    track.clear_tally();
                }
                self.chord.last_resolved = Some(now);
                self.chord.pending = false;
                self.chord.detected_at = None;
            }
            self.chord.armed = true;
        }

        self.classify_pulse(button, at, pulse, now, out);
    }

    fn classify_pulse(
        &mut self,
        button: ButtonId,
        released_at: Instant,
        pulse: Duration,
        now: Instant,
        out: &mut Vec<Gesture>,
    ) {
        let chord_recent =
            Self::within(self.chord.last_resolved, now, self.timings.post_chord_suppress);
        let chord_pending = self.chord.pending;
        let track = &mut self.tracks[button.index()];

        if pulse < self.timings.min_pulse {
            info!(%button, pulse_ms = pulse.as_millis() as u64, "pulse ignored, too short");
            return;
        }

        if pulse >= self.timings.hold_threshold(button) {
            track.clear_tally();
            track.suppress_until = Some(now + self.timings.post_hold_suppress);
            self.holds.record(button, now);
            if chord_recent {
                info!(%button, "hold suppressed, chord resolved just now");
            } else {
                info!(%button, "hold");
                out.push(Gesture::Hold(button));
            }
            return;
        }

        if chord_pending || chord_recent {
            info!(%button, "tap not tallied, chord pending or recent");
            return;
        }
        if track.suppress_until.is_some_and(|until| now < until) {
            info!(%button, "tap suppressed, within hold cooldown");
            return;
        }

        track.taps += 1;
        track.decide_at = Some(released_at + self.timings.tap_decision);
        info!(%button, total = track.taps, "tap tallied");
    }

    fn within(stamp: Option<Instant>, now: Instant, window: Duration) -> bool {
        stamp.is_some_and(|at| now.saturating_duration_since(at) < window)
    }
}
