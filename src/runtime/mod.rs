//! Scheduling primitives: signals, pacing, the idle watchdog and the
//! scheduler loop that ties input, dispatch and states together

mod pacer;
mod scheduler;
mod signals;
mod watchdog;

pub use pacer::{Pacer, Pump};
pub use scheduler::Scheduler;
pub use signals::Signals;
pub use watchdog::IdleWatchdog;
