//! The step/cancel abstraction every timed wait goes through
//!
//! State bodies, the animator and the playback coordinator never sleep
//! directly. They ask the [`Pacer`] to wait, and the pacer decides how: in
//! threaded mode it just sleeps in short slices; in cooperative mode it also
//! pumps input and dispatch between slices so a body running inline on the
//! scheduler thread keeps the rest of the system alive.

use std::sync::{OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::config::ExecutionModel;

use super::Signals;

/// Work the cooperative scheduler needs done between slices
pub trait Pump: Send + Sync {
    fn pump(&self);
}

enum Stepping {
    Threaded,
    Cooperative { pump: OnceLock<Weak<dyn Pump>> },
}

/// Cancellable, model-aware waiting
pub struct Pacer {
    stepping: Stepping,
    signals: Signals,
    slice: Duration,
}

impl Pacer {
    pub fn new(model: ExecutionModel, signals: Signals, slice: Duration) -> Self {
        let stepping = match model {
            ExecutionModel::Threaded => Stepping::Threaded,
            ExecutionModel::Cooperative => Stepping::Cooperative {
                pump: OnceLock::new(),
            },
        };
        Self {
            stepping,
            signals,
            slice: slice.max(Duration::from_millis(1)),
        }
    }

    pub fn model(&self) -> ExecutionModel {
        match self.stepping {
            Stepping::Threaded => ExecutionModel::Threaded,
            Stepping::Cooperative { .. } => ExecutionModel::Cooperative,
        }
    }

    /// Install the cooperative pump. Ignored in threaded mode.
    pub fn attach_pump(&self, pump: Weak<dyn Pump>) {
        match &self.stepping {
            Stepping::Threaded => {}
            Stepping::Cooperative { pump: slot } => {
                if slot.set(pump).is_err() {
                    warn!("cooperative pump already attached");
                }
            }
        }
    }

    /// Whether a wait of this kind should stop now. Non-interruptable work
    /// still yields to shutdown.
    pub fn cancelled(&self, interruptable: bool) -> bool {
        self.signals.shutting_down() || (interruptable && self.signals.interrupted())
    }

    /// Wait `duration`, returning `false` if cancelled before it elapsed.
    pub fn wait(&self, duration: Duration, interruptable: bool) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.cancelled(interruptable) {
                return false;
            }
            self.step();
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(self.slice.min(deadline - now));
        }
    }

    /// Give the cooperative pump a turn
    pub fn step(&self) {
        if let Stepping::Cooperative { pump } = &self.stepping {
            if let Some(pump) = pump.get().and_then(Weak::upgrade) {
                pump.pump();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingPump {
        calls: AtomicUsize,
        signals: Signals,
        interrupt_after: usize,
    }

    impl Pump for CountingPump {
        fn pump(&self) {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if calls == self.interrupt_after {
                self.signals.raise_interrupt();
            }
        }
    }

    fn pacer(model: ExecutionModel) -> (Pacer, Signals) {
        let signals = Signals::new();
        (Pacer::new(model, signals.clone(), Duration::from_millis(1)), signals)
    }

    #[test]
    fn test_wait_runs_to_completion() {
        let (pacer, _) = pacer(ExecutionModel::Threaded);
        let started = Instant::now();
        assert!(pacer.wait(Duration::from_millis(15), true));
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_interrupt_cancels_interruptable_wait_only() {
        let (pacer, signals) = pacer(ExecutionModel::Threaded);
        signals.raise_interrupt();
        assert!(!pacer.wait(Duration::from_secs(5), true));
        assert!(pacer.wait(Duration::from_millis(5), false));
    }

    #[test]
    fn test_shutdown_cancels_every_wait() {
        let (pacer, signals) = pacer(ExecutionModel::Threaded);
        signals.request_shutdown();
        assert!(!pacer.wait(Duration::from_secs(5), false));
    }

    #[test]
    fn test_cooperative_wait_pumps_between_slices() {
        let (pacer, signals) = pacer(ExecutionModel::Cooperative);
        let pump = Arc::new(CountingPump {
            calls: AtomicUsize::new(0),
            signals: signals.clone(),
            interrupt_after: 3,
        });
        let weak: Weak<dyn Pump> = Arc::downgrade(&pump) as Weak<dyn Pump>;
        pacer.attach_pump(weak);

        // the pump raises the interrupt on its third call
        assert!(!pacer.wait(Duration::from_secs(5), true));
        assert_eq!(pump.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_threaded_wait_never_pumps() {
        let (pacer, signals) = pacer(ExecutionModel::Threaded);
        let pump = Arc::new(CountingPump {
            calls: AtomicUsize::new(0),
            signals,
            interrupt_after: 1,
        });
        let weak: Weak<dyn Pump> = Arc::downgrade(&pump) as Weak<dyn Pump>;
        pacer.attach_pump(weak);
        assert!(pacer.wait(Duration::from_millis(5), true));
        assert_eq!(pump.calls.load(Ordering::SeqCst), 0);
    }
}
