//! Input event types shared by the classifier, dispatcher and states
//!
//! Raw [`Edge`]s come from the button source; classified [`Gesture`]s are
//! what the dispatcher and the states react to.

use std::time::Instant;

use serde::{Deserialize, Serialize};

mod queue;

pub use queue::EventQueue;

/// One of the two physical buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonId {
    B1,
    B2,
}

impl ButtonId {
    pub const ALL: [ButtonId; 2] = [ButtonId::B1, ButtonId::B2];

    /// The opposite button
    pub fn other(self) -> Self {
        match self {
            ButtonId::B1 => ButtonId::B2,
            ButtonId::B2 => ButtonId::B1,
        }
    }

    /// Stable index for per-button arrays
    pub fn index(self) -> usize {
        match self {
            ButtonId::B1 => 0,
            ButtonId::B2 => 1,
        }
    }
}

impl std::fmt::Display for ButtonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ButtonId::B1 => write!(f, "B1"),
            ButtonId::B2 => write!(f, "B2"),
        }
    }
}

/// Direction of a raw transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Press,
    Release,
}

/// A pressed/released transition on one button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub button: ButtonId,
    pub kind: EdgeKind,
    /// Monotonic time the transition was observed
    pub at: Instant,
}

impl Edge {
    pub fn press(button: ButtonId, at: Instant) -> Self {
        Self {
            button,
            kind: EdgeKind::Press,
            at,
        }
    }

    pub fn release(button: ButtonId, at: Instant) -> Self {
        Self {
            button,
            kind: EdgeKind::Release,
            at,
        }
    }
}

/// Classified logical input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "button", rename_all = "snake_case")]
pub enum Gesture {
    /// One short pulse followed by a quiet decision window
    Tap(ButtonId),
    /// Two to four short pulses inside the decision window
    Double(ButtonId),
    /// A pulse at or above the button's hold threshold
    Hold(ButtonId),
    /// Five or more short pulses inside the decision window
    FiveTap(ButtonId),
    /// Both buttons pressed together and released
    Chord,
}

impl std::fmt::Display for Gesture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gesture::Tap(b) => write!(f, "{}_TAP", b),
            Gesture::Double(b) => write!(f, "{}_DOUBLE", b),
            Gesture::Hold(b) => write!(f, "{}_HOLD", b),
            Gesture::FiveTap(b) => write!(f, "{}_5TAP", b),
            Gesture::Chord => write!(f, "B1B2_CHORD"),
        }
    }
}
