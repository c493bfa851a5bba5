//! JSON-lines trace of classified gestures

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::warn;

use crate::events::Gesture;

#[derive(Serialize)]
struct TraceLine {
    at_ms: u64,
    gesture: Gesture,
}

/// Appends one line per gesture, timestamped from trace creation
pub struct GestureTrace<W: Write = BufWriter<File>> {
    writer: W,
    started: Instant,
    failed: bool,
}

impl GestureTrace {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), Instant::now()))
    }
}

impl<W: Write> GestureTrace<W> {
    pub fn new(writer: W, started: Instant) -> Self {
        Self {
            writer,
            started,
            failed: false,
        }
    }

    pub fn record(&mut self, gesture: Gesture, now: Instant) {
        if self.failed {
            return;
        }
        let line = TraceLine {
            at_ms: now.saturating_duration_since(self.started).as_millis() as u64,
            gesture,
        };
        let result = serde_json::to_writer(&mut self.writer, &line)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"))
            .and_then(|_| self.writer.flush());
        if let Err(e) = result {
            // One warning, then the trace goes quiet
            warn!(?e, "gesture trace write failed, disabling trace");
            self.failed = true;
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ButtonId;
    use std::time::Duration;

    #[test]
    fn test_trace_lines() {
        let started = Instant::now();
        let mut trace = GestureTrace::new(Vec::new(), started);
        trace.record(Gesture::FiveTap(ButtonId::B1), started + Duration::from_millis(1150));
        trace.record(Gesture::Chord, started + Duration::from_millis(2000));
        let text = String::from_utf8(trace.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"at_ms\":1150"));
        assert!(lines[0].contains("five_tap"));
        assert!(lines[1].contains("chord"));
    }
}
