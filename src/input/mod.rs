//! Button input pipeline
//!
//! Raw edges from a [`ButtonSource`] are classified into gestures by the
//! [`GestureClassifier`], repaired by the [`ResyncMonitor`] when an interrupt
//! was missed, and published to the event queue by the [`InputMonitor`].

mod buttons;
mod classifier;
mod monitor;
mod resync;
mod trace;

pub use buttons::{ButtonSource, CallbackButtons, EdgeSink, ScriptError, ScriptedButtons};
pub use classifier::{GestureClassifier, HoldStamps};
pub use monitor::{InputMonitor, MonitorError, MonitorHandle};
pub use resync::ResyncMonitor;
pub use trace::GestureTrace;
