//! BinaryHeap-based timer queue
//!
//! # Complexity
//!
//! - Insert: O(log n)
//! - Cancel: O(1) (lazy, the heap entry is skipped when popped)
//! - Pop expired: O(log n) per timer
//!
//! The queue is owned by one single-threaded scheduler, so there is no
//! internal locking.

use std::collections::{BinaryHeap, HashSet};
use std::rc::Rc;
use std::time::Instant;

use cvloop_core::Trigger;

use crate::timer::{TimerEntry, TimerHandle};

/// Stale entries tolerated beyond twice the live count before a rebuild
const COMPACT_SLACK: usize = 64;

/// Wrapper for heap ordering (min-heap by deadline, then insertion)
struct HeapEntry(TimerEntry);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.deadline == other.0.deadline && self.0.seq == other.0.seq
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed: BinaryHeap is a max-heap
        other
            .0
            .deadline
            .cmp(&self.0.deadline)
            .then_with(|| other.0.seq.cmp(&self.0.seq))
    }
}

/// A timer that just expired, ready to be fired
pub struct FiredTimer {
    pub handle: TimerHandle,
    pub trigger: Rc<dyn Trigger>,
}

/// Timer queue for one scheduler
pub struct TimerQueue {
    heap: BinaryHeap<HeapEntry>,

    /// Handles of timers that have not fired (one-shot) or been cleared
    live: HashSet<TimerHandle>,

    next_seq: u64,

    total_inserted: u64,
    total_fired: u64,
    total_cancelled: u64,
    compactions: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            live: HashSet::with_capacity(capacity),
            next_seq: 0,
            total_inserted: 0,
            total_fired: 0,
            total_cancelled: 0,
            compactions: 0,
        }
    }

    fn push(&mut self, mut entry: TimerEntry) {
        entry.seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(HeapEntry(entry));
    }

    pub(crate) fn insert(&mut self, entry: TimerEntry) -> TimerHandle {
        let handle = entry.handle;
        self.live.insert(handle);
        self.push(entry);
        self.total_inserted += 1;
        handle
    }

    /// Cancel a timer; false if it already fired or was cancelled
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let removed = self.live.remove(&handle);
        if removed {
            self.total_cancelled += 1;
        }
        if self.live.is_empty() {
            self.heap.clear();
        } else if self.heap.len() > 2 * self.live.len() + COMPACT_SLACK {
            self.compact();
        }
        removed
    }

    /// Drop every heap entry whose timer is no longer live
    fn compact(&mut self) {
        let live = &self.live;
        self.heap.retain(|e| live.contains(&e.0.handle));
        self.compactions += 1;
    }

    /// Pop the earliest timer whose deadline is at or before `now`
    ///
    /// Repeating timers are re-armed at `now + interval` before being
    /// returned, so clearing one from inside its own trigger works.
    pub fn pop_expired(&mut self, now: Instant) -> Option<FiredTimer> {
        loop {
            match self.heap.peek() {
                Some(top) if top.0.deadline <= now => {}
                _ => return None,
            }
            let HeapEntry(entry) = self.heap.pop()?;

            if !self.live.contains(&entry.handle) {
                continue;
            }

            match entry.reschedule(now) {
                Some(next) => self.push(next),
                None => {
                    self.live.remove(&entry.handle);
                }
            }

            self.total_fired += 1;
            return Some(FiredTimer {
                handle: entry.handle,
                trigger: entry.trigger,
            });
        }
    }

    /// Earliest deadline of a live timer
    pub fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(top) = self.heap.peek() {
            if self.live.contains(&top.0.handle) {
                return Some(top.0.deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Number of live timers
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn is_live(&self, handle: TimerHandle) -> bool {
        self.live.contains(&handle)
    }

    /// Get statistics snapshot
    pub fn stats(&self) -> TimerStats {
        TimerStats {
            active: self.live.len(),
            heap_entries: self.heap.len(),
            total_inserted: self.total_inserted,
            total_fired: self.total_fired,
            total_cancelled: self.total_cancelled,
            compactions: self.compactions,
        }
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for TimerQueue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerStats {
    /// Live (not fired, not cancelled) timers
    pub active: usize,
    /// Heap entries including stale ones awaiting lazy removal
    pub heap_entries: usize,
    pub total_inserted: u64,
    pub total_fired: u64,
    pub total_cancelled: u64,
    /// Heap rebuilds triggered by accumulated cancellations
    pub compactions: u64,
}
