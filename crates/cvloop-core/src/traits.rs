//! Event loop and trigger traits
//!
//! These traits define the interface between the platform-agnostic
//! condition variable core and whatever event loop drives it.

use std::rc::Rc;
use std::time::Duration;

/// Handle to a keepalive timer acquired from an [`EventLoop`]
///
/// Opaque to the core; the loop decides what the raw value means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeepaliveHandle(pub u64);

impl KeepaliveHandle {
    /// Get the raw handle value (for debugging/logging)
    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The narrow view of an event loop that the wait protocol needs
///
/// The loop is single-threaded and cooperative. All methods take `&self`
/// because callbacks run from inside `run_once` are free to schedule
/// more work on the same loop.
pub trait EventLoop {
    /// Run one pass of currently-ready work
    ///
    /// May block until the next piece of work is due. Returns whether
    /// any work (timers, queued tasks, remote handles) is still
    /// outstanding afterwards.
    fn run_once(&self) -> bool;

    /// Acquire a long-period repeating timer whose only job is to keep
    /// the loop from considering itself idle
    fn schedule_keepalive(&self, period: Duration) -> KeepaliveHandle;

    /// Release a keepalive timer
    fn cancel_keepalive(&self, handle: KeepaliveHandle);

    /// Loop name (for logging)
    fn name(&self) -> &'static str {
        "unknown"
    }
}

impl<L: EventLoop + ?Sized> EventLoop for Rc<L> {
    fn run_once(&self) -> bool {
        (**self).run_once()
    }

    fn schedule_keepalive(&self, period: Duration) -> KeepaliveHandle {
        (**self).schedule_keepalive(period)
    }

    fn cancel_keepalive(&self, handle: KeepaliveHandle) {
        (**self).cancel_keepalive(handle)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Something that can be fired by a timer or any other callback API
///
/// Closures get this for free. A [`CondVar`](crate::condvar::CondVar)
/// implements it as "resolve with no value", so a condition variable can
/// be handed directly to a timer.
pub trait Trigger {
    /// Fire
    fn trigger(&self);
}

impl<F: Fn()> Trigger for F {
    #[inline]
    fn trigger(&self) {
        self()
    }
}
