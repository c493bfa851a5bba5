//! Raw button sources
//!
//! A source exposes the instantaneous level of each button (for resync) and
//! delivers edges either from an asynchronous callback ([`CallbackButtons`])
//! or when polled once per tick ([`ScriptedButtons`]).

use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::events::{ButtonId, Edge, EdgeKind};

/// Anything that can report button levels and deliver edges
pub trait ButtonSource: Send {
    /// Instantaneous raw level, `true` while pressed
    fn is_pressed(&self, button: ButtonId) -> bool;

    /// Deliver edges that became due by `now`. Callback-driven sources push
    /// from their own context and leave this empty.
    fn poll(&mut self, _now: Instant, _edges: &Sender<Edge>) {}
}

/// Errors loading an edge script
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("failed to read edge script: {0}")]
    Io(#[from] std::io::Error),

    #[error("edge script line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Levels shared between a callback source and its sink handles
#[derive(Debug, Default)]
struct Levels([AtomicBool; 2]);

/// Source fed by an interrupt callback through [`EdgeSink`] handles
pub struct CallbackButtons {
    levels: Arc<Levels>,
}

/// Cloneable handle given to the hardware callback
#[derive(Clone)]
pub struct EdgeSink {
    levels: Arc<Levels>,
    tx: Sender<Edge>,
}

impl CallbackButtons {
    pub fn new(tx: Sender<Edge>) -> (Self, EdgeSink) {
        let levels = Arc::new(Levels::default());
        let sink = EdgeSink {
            levels: Arc::clone(&levels),
            tx,
        };
        (Self { levels }, sink)
    }
}

impl ButtonSource for CallbackButtons {
    fn is_pressed(&self, button: ButtonId) -> bool {
        self.levels.0[button.index()].load(Ordering::SeqCst)
    }
}

impl EdgeSink {
    /// Record the new level of `button` and queue the edge. Must stay
    /// cheap: this runs in interrupt-callback context.
    pub fn level_changed(&self, button: ButtonId, pressed: bool) {
        self.levels.0[button.index()].store(pressed, Ordering::SeqCst);
        let at = Instant::now();
        let edge = if pressed {
            Edge::press(button, at)
        } else {
            Edge::release(button, at)
        };
        if self.tx.send(edge).is_err() {
            debug!(%button, "edge dropped, input monitor gone");
        }
    }

    /// Change the level without delivering an edge, as a lost interrupt would
    #[cfg(test)]
    pub fn level_changed_silently(&self, button: ButtonId, pressed: bool) {
        self.levels.0[button.index()].store(pressed, Ordering::SeqCst);
    }
}

/// One line of an edge script
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptEntry {
    /// Offset from the first poll
    pub at_ms: u64,
    pub button: ButtonId,
    pub kind: EdgeKind,
    /// Change the level without delivering the edge
    #[serde(default)]
    pub missed: bool,
}

/// Replays a JSON-lines edge script against the real clock
pub struct ScriptedButtons {
    entries: Vec<ScriptEntry>,
    cursor: usize,
    started: Option<Instant>,
    levels: [bool; 2],
}

impl ScriptedButtons {
    pub fn new(mut entries: Vec<ScriptEntry>) -> Self {
        entries.sort_by_key(|e| e.at_ms);
        Self {
            entries,
            cursor: 0,
            started: None,
            levels: [false; 2],
        }
    }

    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self, ScriptError> {
        let mut entries = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let entry = serde_json::from_str(trimmed).map_err(|source| ScriptError::Parse {
                line: idx + 1,
                source,
            })?;
            entries.push(entry);
        }
        Ok(Self::new(entries))
    }

    /// Whether every entry has been replayed
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.entries.len()
    }
}

impl ButtonSource for ScriptedButtons {
    fn is_pressed(&self, button: ButtonId) -> bool {
        self.levels[button.index()]
    }

    fn poll(&mut self, now: Instant, edges: &Sender<Edge>) {
        if self.is_finished() {
            return;
        }
        let started = *self.started.get_or_insert(now);

        while let Some(entry) = self.entries.get(self.cursor) {
            let due = started + Duration::from_millis(entry.at_ms);
            if due > now {
                break;
            }
            self.cursor += 1;
            self.levels[entry.button.index()] = entry.kind == EdgeKind::Press;
            if entry.missed {
                warn!(button = %entry.button, kind = ?entry.kind, "script: dropping edge");
                continue;
            }
            let edge = Edge {
                button: entry.button,
                kind: entry.kind,
                at: due,
            };
            if edges.send(edge).is_err() {
                debug!("script edge dropped, input monitor gone");
            }
        }
    }
}
