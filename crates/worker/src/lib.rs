//! Shared worker runtime primitives.
//!
//! Everything that leaves the control thread goes through this crate: a
//! dedicated multi-thread runtime, a bounded [`WorkerPool`] capping how many
//! generator runs execute at once, generation-scoped cancellation tokens, and
//! the [`DoneLatch`] a control thread blocks on during teardown.

mod class;
mod latch;
mod pool;
mod spawn;
mod token;

pub use class::TaskClass;
pub use latch::DoneLatch;
pub use pool::WorkerPool;
pub use spawn::{runtime_handle, spawn, spawn_blocking};
pub use token::{GenerationClock, GenerationToken};
