//! Loop thread parking
//!
//! The scheduler parks its thread when nothing is runnable and the next
//! timer is in the future. Any `Remote` can unpark it from another
//! thread after posting work.

use std::sync::Arc;
use std::time::Duration;

/// Sleep/wake primitive for the single loop thread
///
/// Exactly one thread (the loop's) parks. An `unpark()` issued while the
/// loop is not parked is remembered, so the next `park()` returns
/// immediately instead of sleeping through the wake.
pub trait LoopParking: Send + Sync {
    /// Park until unparked or until `timeout` elapses
    ///
    /// Returns `true` if woken by `unpark()`, `false` on timeout or a
    /// spurious wakeup. Callers re-check for work either way.
    fn park(&self, timeout: Option<Duration>) -> bool;

    /// Wake the loop thread, or make its next `park()` return at once
    fn unpark(&self);

    /// Whether the loop thread is currently parked (hint, may be stale)
    fn is_parked(&self) -> bool;
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexParking as PlatformParking;
    } else {
        mod fallback;
        pub use fallback::FallbackParking as PlatformParking;
    }
}

/// Create a new platform-appropriate parking instance
pub fn new_parking() -> Arc<dyn LoopParking> {
    Arc::new(PlatformParking::new())
}
