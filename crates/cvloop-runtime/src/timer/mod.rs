//! Timers for the cvloop event loop
//!
//! One-shot and repeating timers kept in a binary min-heap ordered by
//! deadline. Cancellation is lazy: a cancelled timer's heap entry stays
//! until it reaches the top and is discarded there.
//!
//! ```text
//!   Scheduler::set_timeout / set_interval
//!                 │
//!                 ▼
//!        TimerQueue (BinaryHeap + live set)
//!                 │
//!   run_once ──pop_expired(now)──► Trigger::trigger()
//! ```

mod entry;
mod heap;

pub use entry::{TimerHandle, TimerType};
pub use heap::{FiredTimer, TimerQueue, TimerStats};

pub(crate) use entry::TimerEntry;
