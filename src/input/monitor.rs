//! Input monitor: edge intake, classification and resync
//!
//! In threaded mode the monitor runs on a dedicated thread, blocking on the
//! edge queue with a short timeout. In cooperative mode the scheduler calls
//! [`InputMonitor::step`] with a zero wait between animation frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info};

use crate::config::Timings;
use crate::events::{Edge, EventQueue, Gesture};

use super::buttons::ButtonSource;
use super::classifier::{GestureClassifier, HoldStamps};
use super::resync::ResyncMonitor;
use super::trace::GestureTrace;

/// Errors that can occur starting the monitor thread
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("failed to spawn input monitor thread: {0}")]
    ThreadSpawn(String),
}

/// Owns the classifier pipeline for both buttons
pub struct InputMonitor {
    source: Box<dyn ButtonSource>,
    edge_tx: Sender<Edge>,
    edge_rx: Receiver<Edge>,
    classifier: GestureClassifier,
    resync: ResyncMonitor,
    queue: EventQueue,
    trace: Option<GestureTrace>,
    scratch: Vec<Gesture>,
}

impl InputMonitor {
    /// Build a monitor around a source. The returned sender is the edge
    /// intake for callback-driven sources.
    pub fn new(
        timings: Timings,
        holds: HoldStamps,
        queue: EventQueue,
        source: impl FnOnce(Sender<Edge>) -> Box<dyn ButtonSource>,
    ) -> Self {
        let (edge_tx, edge_rx) = unbounded();
        Self {
            source: source(edge_tx.clone()),
            edge_tx,
            edge_rx,
            classifier: GestureClassifier::new(timings.clone(), holds),
            resync: ResyncMonitor::new(timings),
            queue,
            trace: None,
            scratch: Vec::new(),
        }
    }

    pub fn with_trace(mut self, trace: GestureTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// One monitor iteration: intake, deadline decisions, resync, publish.
    ///
    /// Blocks at most `wait` for the first edge; any further edges already
    /// queued are taken without waiting.
    pub fn step(&mut self, wait: Duration) {
        self.source.poll(Instant::now(), &self.edge_tx);

        let first = if wait.is_zero() {
            self.edge_rx.try_recv().ok()
        } else {
            match self.edge_rx.recv_timeout(wait) {
                Ok(edge) => Some(edge),
                Err(RecvTimeoutError::Timeout) => None,
                // We hold a sender ourselves, so this cannot happen
                Err(RecvTimeoutError::Disconnected) => None,
            }
        };
        if let Some(edge) = first {
            self.classifier.on_edge(edge, Instant::now(), &mut self.scratch);
            while let Ok(edge) = self.edge_rx.try_recv() {
                self.classifier.on_edge(edge, Instant::now(), &mut self.scratch);
            }
        }

        let now = Instant::now();
        self.classifier.poll(now, &mut self.scratch);

        let source = &self.source;
        self.resync.tick(
            |button| source.is_pressed(button),
            &mut self.classifier,
            now,
            &mut self.scratch,
        );

        for gesture in self.scratch.drain(..) {
            info!(%gesture, "gesture queued");
            if let Some(trace) = self.trace.as_mut() {
                trace.record(gesture, now);
            }
            self.queue.push(gesture);
        }
    }

    /// Run the monitor on its own thread until stopped or shutdown
    pub fn spawn(
        mut self,
        tick: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> Result<MonitorHandle, MonitorError> {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("input-monitor".to_string())
            .spawn(move || {
                info!("input monitor thread started");
                while thread_running.load(Ordering::SeqCst) && !shutdown.load(Ordering::SeqCst) {
                    self.step(tick);
                }
                thread_running.store(false, Ordering::SeqCst);
                info!("input monitor thread stopped");
            })
            .map_err(|e| {
                error!(?e, "failed to spawn input monitor");
                MonitorError::ThreadSpawn(e.to_string())
            })?;

        Ok(MonitorHandle {
            running,
            handle: Some(handle),
        })
    }
}

/// Handle to a monitor running on its own thread
pub struct MonitorHandle {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Stop the monitor and wait for its thread
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("input monitor thread panicked");
            }
        }
        debug!("input monitor stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ButtonId;
    use crate::input::buttons::CallbackButtons;

    fn callback_monitor(queue: &EventQueue) -> (InputMonitor, crate::input::EdgeSink) {
        let mut sink = None;
        let monitor = InputMonitor::new(
            Timings::default(),
            HoldStamps::default(),
            queue.clone(),
            |tx| {
                let (source, edge_sink) = CallbackButtons::new(tx);
                sink = Some(edge_sink);
                Box::new(source)
            },
        );
        (monitor, sink.expect("source constructed"))
    }

    #[test]
    fn test_hold_reaches_queue() {
        let queue = EventQueue::new();
        let (mut monitor, sink) = callback_monitor(&queue);

        // Push edges with explicit timestamps so the pulse is a hold
        let base = Instant::now();
        monitor
            .edge_tx
            .send(Edge::press(ButtonId::B1, base))
            .unwrap();
        monitor
            .edge_tx
            .send(Edge::release(ButtonId::B1, base + Duration::from_millis(900)))
            .unwrap();
        sink.level_changed_silently(ButtonId::B1, false);

        monitor.step(Duration::ZERO);
        assert_eq!(queue.try_pop(), Some(Gesture::Hold(ButtonId::B1)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_threaded_monitor_stops() {
        let queue = EventQueue::new();
        let (monitor, _sink) = callback_monitor(&queue);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut handle = monitor
            .spawn(Duration::from_millis(5), Arc::clone(&shutdown))
            .unwrap();
        assert!(handle.is_running());
        handle.stop();
        assert!(!handle.is_running());
    }
}
