//! Audio sessions, sprite animation and their rendezvous

mod animator;
mod coordinator;
mod rendezvous;

pub use animator::Animator;
pub use coordinator::{PlayOutcome, PlaybackCoordinator, PlaybackSession};
pub use rendezvous::{accompany, AudioCell};
