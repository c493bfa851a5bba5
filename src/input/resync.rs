//! Self-healing edge resync
//!
//! A missed hardware interrupt leaves the classifier believing a button is
//! up while it is held (or the reverse). The monitor compares the raw level
//! with the classifier's belief every tick and, once a disagreement has been
//! stable long enough, synthesizes the missing edge through the normal
//! classification path.

use std::time::Instant;

use tracing::warn;

use crate::config::Timings;
use crate::events::{ButtonId, Edge, Gesture};

use super::classifier::GestureClassifier;

#[derive(Debug, Default, Clone, Copy)]
struct ResyncTrack {
    disagree_since: Option<Instant>,
    last_synth: Option<Instant>,
}

/// Per-button drift detector
pub struct ResyncMonitor {
    timings: Timings,
    tracks: [ResyncTrack; 2],
}

impl ResyncMonitor {
    pub fn new(timings: Timings) -> Self {
        Self {
            timings,
            tracks: Default::default(),
        }
    }

    /// Compare raw levels against the classifier and repair drift.
    ///
    /// Returns the number of edges synthesized this tick.
    pub fn tick(
        &mut self,
        raw_pressed: impl Fn(ButtonId) -> bool,
        classifier: &mut GestureClassifier,
        now: Instant,
        out: &mut Vec<Gesture>,
    ) -> usize {
        let mut synthesized = 0;

        for button in ButtonId::ALL {
            let raw = raw_pressed(button);
            let track = &mut self.tracks[button.index()];

            if raw == classifier.is_down(button) {
                track.disagree_since = None;
                continue;
            }

            let since = *track.disagree_since.get_or_insert(now);
            if now.saturating_duration_since(since) < self.timings.resync_stability {
                continue;
            }
            let cooling = track
                .last_synth
                .is_some_and(|at| now.saturating_duration_since(at) < self.timings.resync_cooldown);
            if cooling {
                continue;
            }

            let edge = if raw {
                Edge::press(button, now)
            } else {
                Edge::release(button, now)
            };
            warn!(%button, kind = ?edge.kind, "synthesizing missed edge");
            track.last_synth = Some(now);
            track.disagree_since = None;
            classifier.on_edge(edge, now, out);
            synthesized += 1;
        }

        synthesized
    }
}
