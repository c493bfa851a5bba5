//! Process lifecycle: termination signals and orderly teardown

mod shutdown;
mod teardown;

pub use shutdown::ShutdownSignal;
pub use teardown::teardown;
