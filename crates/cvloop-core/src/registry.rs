//! WaiterRegistry - keepalive and blocking-wait bookkeeping
//!
//! One registry exists per event loop. Every condition variable created
//! against it bumps a live counter; every `recv()` that reaches
//! completion drops it again. While the counter is positive the registry
//! holds a long-period keepalive timer on the loop so the loop never
//! decides it is idle while a condition variable may still be waited on.
//!
//! The registry also tracks how many blocking waits are currently
//! pumping the loop. At most one may do so: the loop is not reentrant.
//!
//! All state lives in `Cell`s. The registry is `!Sync` and is only ever
//! touched from the loop thread.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::error::LoopError;
use crate::id::CvId;
use crate::pump::{pump_until, PumpOutcome};
use crate::traits::{EventLoop, KeepaliveHandle};
use crate::{kdebug, kwarn};

/// Period of the keepalive timer (about 46 days)
///
/// The timer never does anything when it fires; it only has to exist.
pub const DEFAULT_KEEPALIVE_PERIOD: Duration = Duration::from_millis(4_000_000_000);

/// Waiter and keepalive registry for one event loop
///
/// # Example
///
/// ```ignore
/// let registry = Rc::new(WaiterRegistry::new(Rc::new(scheduler.clone())));
/// let cv: CondVar<&str> = CondVar::new(&registry);
/// assert_eq!(registry.live_count(), 1);
/// ```
pub struct WaiterRegistry {
    event_loop: Rc<dyn EventLoop>,
    keepalive_period: Duration,

    /// Condition variables ever created (id source)
    total_created: Cell<u64>,

    /// Creations minus completed `recv()` calls. Signed on purpose:
    /// calling `recv()` more often than creating drives it negative.
    live_count: Cell<i64>,

    /// Blocking waits currently pumping the loop (0 or 1)
    blocking_depth: Cell<u32>,

    keepalive: Cell<Option<KeepaliveHandle>>,

    /// Stats: nested waits rejected
    reentrant_rejections: Cell<u64>,
}

impl WaiterRegistry {
    /// Create a registry for the given loop with the default keepalive period
    pub fn new(event_loop: Rc<dyn EventLoop>) -> Self {
        Self::with_keepalive_period(event_loop, DEFAULT_KEEPALIVE_PERIOD)
    }

    /// Create a registry with an explicit keepalive period
    pub fn with_keepalive_period(event_loop: Rc<dyn EventLoop>, period: Duration) -> Self {
        Self {
            event_loop,
            keepalive_period: period,
            total_created: Cell::new(0),
            live_count: Cell::new(0),
            blocking_depth: Cell::new(0),
            keepalive: Cell::new(None),
            reentrant_rejections: Cell::new(0),
        }
    }

    /// The loop this registry pumps
    #[inline]
    pub fn event_loop(&self) -> &Rc<dyn EventLoop> {
        &self.event_loop
    }

    // ========================================================================
    // Creation / completion
    // ========================================================================

    /// Account for a newly created condition variable and return its id
    ///
    /// Acquires the keepalive on the 0 -> 1 transition of the live count.
    pub fn register(&self) -> CvId {
        let id = CvId::new(self.total_created.get());
        self.total_created.set(id.as_u64() + 1);

        let prev = self.live_count.get();
        self.live_count.set(prev + 1);
        if prev == 0 {
            self.acquire_keepalive();
        }
        id
    }

    /// Account for one `recv()` call reaching completion
    ///
    /// Runs for every call, including ones that never had to wait and
    /// ones rejected as reentrant. Releases the keepalive when the live
    /// count hits exactly zero.
    pub fn wait_completed(&self) {
        let live = self.live_count.get() - 1;
        self.live_count.set(live);
        if live == 0 {
            self.release_keepalive();
        } else if live < 0 {
            kwarn!(
                "cvloop: live count is {} (more recv() calls than condvars created)",
                live
            );
        }
    }

    // ========================================================================
    // Blocking waits
    // ========================================================================

    /// Start a blocking wait
    ///
    /// Returns `None` if another blocking wait is already pumping the
    /// loop; the depth is left untouched in that case. The returned
    /// guard ends the wait when dropped, including during unwinding.
    pub fn enter_wait(&self) -> Option<WaitGuard<'_>> {
        let prev = self.blocking_depth.get();
        if prev >= 1 {
            self.reentrant_rejections
                .set(self.reentrant_rejections.get() + 1);
            kwarn!("cvloop: recursive blocking wait attempted (depth {})", prev);
            return None;
        }
        self.blocking_depth.set(prev + 1);
        Some(WaitGuard { registry: self })
    }

    /// Drive the loop at top level until it runs out of work
    ///
    /// Counts as a blocking wait, so a `recv()` that would have to pump
    /// from inside one of the callbacks fails with
    /// [`RecvError::ReentrantWait`](crate::error::RecvError::ReentrantWait)
    /// instead of re-entering the loop. Returns the number of passes.
    pub fn drive(&self) -> Result<u64, LoopError> {
        let _guard = self.enter_wait().ok_or(LoopError::Reentrant)?;
        match pump_until(self.event_loop.as_ref(), || false) {
            PumpOutcome::Ready { passes } | PumpOutcome::Exhausted { passes } => Ok(passes),
        }
    }

    // ========================================================================
    // Keepalive
    // ========================================================================

    fn acquire_keepalive(&self) {
        if self.keepalive.get().is_some() {
            return;
        }
        let handle = self.event_loop.schedule_keepalive(self.keepalive_period);
        kdebug!(
            "cvloop: keepalive {} acquired on {}",
            handle.raw(),
            self.event_loop.name()
        );
        self.keepalive.set(Some(handle));
    }

    fn release_keepalive(&self) {
        if let Some(handle) = self.keepalive.take() {
            kdebug!("cvloop: keepalive {} released", handle.raw());
            self.event_loop.cancel_keepalive(handle);
        }
    }

    /// Unconditionally release the keepalive timer
    ///
    /// Meant for teardown in tests and shutdown paths. Counters are not
    /// touched, so the keepalive is only re-acquired by a future 0 -> 1
    /// transition of the live count.
    pub fn force_stop(&self) {
        self.release_keepalive();
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    #[inline]
    pub fn total_created(&self) -> u64 {
        self.total_created.get()
    }

    #[inline]
    pub fn live_count(&self) -> i64 {
        self.live_count.get()
    }

    #[inline]
    pub fn blocking_depth(&self) -> u32 {
        self.blocking_depth.get()
    }

    #[inline]
    pub fn keepalive_active(&self) -> bool {
        self.keepalive.get().is_some()
    }

    /// Get statistics snapshot
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total_created: self.total_created.get(),
            live_count: self.live_count.get(),
            blocking_depth: self.blocking_depth.get(),
            keepalive_active: self.keepalive_active(),
            reentrant_rejections: self.reentrant_rejections.get(),
        }
    }
}

impl Drop for WaiterRegistry {
    fn drop(&mut self) {
        self.release_keepalive();
    }
}

impl std::fmt::Debug for WaiterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaiterRegistry")
            .field("loop", &self.event_loop.name())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Marks one blocking wait in progress; dropping it ends the wait
#[must_use = "the wait ends as soon as the guard is dropped"]
pub struct WaitGuard<'a> {
    registry: &'a WaiterRegistry,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        let depth = self.registry.blocking_depth.get();
        self.registry.blocking_depth.set(depth.saturating_sub(1));
    }
}

/// Snapshot of registry counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_created: u64,
    pub live_count: i64,
    pub blocking_depth: u32,
    pub keepalive_active: bool,
    /// Nested blocking waits rejected (lifetime)
    pub reentrant_rejections: u64,
}
