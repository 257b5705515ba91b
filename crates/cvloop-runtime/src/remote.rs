//! Cross-thread injection into the loop
//!
//! A [`Remote`] is the only part of the runtime that may leave the loop
//! thread. Work posted through it lands in a lock-free queue that the
//! loop drains at the start of every pass; the post also unparks the
//! loop if it is asleep.
//!
//! Every live `Remote` counts as pending work, the way an active libuv
//! async handle keeps its loop alive. Drop the handle once no further
//! posts will come.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_queue::SegQueue;

use cvloop_core::LoopError;

use crate::parking::LoopParking;

/// A unit of work posted from another thread
pub(crate) type RemoteTask = Box<dyn FnOnce() + Send + 'static>;

/// State shared between the scheduler and its remote handles
pub(crate) struct RemoteShared {
    queue: SegQueue<RemoteTask>,
    parking: Arc<dyn LoopParking>,
    /// Live `Remote` handles
    handles: AtomicUsize,
    /// Set when the scheduler is dropped
    closed: AtomicBool,
    /// Stats: tasks ever posted
    posted: AtomicUsize,
}

impl RemoteShared {
    pub(crate) fn new(parking: Arc<dyn LoopParking>) -> Self {
        Self {
            queue: SegQueue::new(),
            parking,
            handles: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            posted: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub(crate) fn parking(&self) -> &Arc<dyn LoopParking> {
        &self.parking
    }

    #[inline]
    pub(crate) fn pop(&self) -> Option<RemoteTask> {
        self.queue.pop()
    }

    #[inline]
    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub(crate) fn live_handles(&self) -> usize {
        self.handles.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn total_posted(&self) -> usize {
        self.posted.load(Ordering::Relaxed)
    }

    /// Refuse further posts and drop whatever is still queued
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        while self.queue.pop().is_some() {}
    }
}

/// `Send` handle for posting work onto a loop from any thread
///
/// Created with `Scheduler::remote()`.
pub struct Remote {
    shared: Arc<RemoteShared>,
}

impl Remote {
    pub(crate) fn new(shared: Arc<RemoteShared>) -> Self {
        shared.handles.fetch_add(1, Ordering::AcqRel);
        Self { shared }
    }

    /// Queue `task` to run on the loop thread during its next pass
    ///
    /// Returns [`LoopError::Closed`] once the scheduler has been dropped;
    /// the task is discarded in that case.
    pub fn post<F>(&self, task: F) -> Result<(), LoopError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_closed() {
            return Err(LoopError::Closed);
        }
        self.shared.queue.push(Box::new(task));
        self.shared.posted.fetch_add(1, Ordering::Relaxed);
        self.shared.parking.unpark();
        Ok(())
    }

    /// Whether the scheduler behind this handle is gone
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl Clone for Remote {
    fn clone(&self) -> Self {
        Remote::new(Arc::clone(&self.shared))
    }
}

impl Drop for Remote {
    fn drop(&mut self) {
        self.shared.handles.fetch_sub(1, Ordering::AcqRel);
        // Let a parked loop notice it may have run out of work
        self.shared.parking.unpark();
    }
}

impl std::fmt::Debug for Remote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remote")
            .field("closed", &self.is_closed())
            .field("handles", &self.shared.live_handles())
            .finish()
    }
}
