//! Timer entry and handle types

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use cvloop_core::Trigger;

/// Process-unique timer handle, used for cancellation
///
/// A repeating timer keeps its handle across firings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

impl TimerHandle {
    /// Generate a new unique timer handle
    #[inline]
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        TimerHandle(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw handle value (for debugging/logging)
    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TimerHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Type of timer - affects behavior after firing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerType {
    /// Fires once, then is gone
    Once,
    /// Fires every `interval` until cleared
    Repeating { interval: Duration },
}

impl TimerType {
    #[inline]
    pub fn is_repeating(&self) -> bool {
        matches!(self, TimerType::Repeating { .. })
    }
}

/// Delays past this saturate instead of overflowing `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `now + delay`, saturating at a far-future deadline
pub(crate) fn deadline_after(now: Instant, delay: Duration) -> Instant {
    if let Some(deadline) = now.checked_add(delay) {
        return deadline;
    }
    let mut cap = FAR_FUTURE;
    loop {
        if let Some(deadline) = now.checked_add(cap) {
            return deadline;
        }
        cap /= 2;
    }
}

/// A scheduled timer
pub(crate) struct TimerEntry {
    pub handle: TimerHandle,
    pub deadline: Instant,
    /// Insertion order, breaks deadline ties
    pub seq: u64,
    pub timer_type: TimerType,
    pub trigger: Rc<dyn Trigger>,
}

impl TimerEntry {
    /// One-shot timer firing after `delay`
    pub fn once(delay: Duration, trigger: Rc<dyn Trigger>) -> Self {
        Self {
            handle: TimerHandle::new(),
            deadline: deadline_after(Instant::now(), delay),
            seq: 0,
            timer_type: TimerType::Once,
            trigger,
        }
    }

    /// Repeating timer, first firing after one `interval`
    pub fn repeating(interval: Duration, trigger: Rc<dyn Trigger>) -> Self {
        Self {
            handle: TimerHandle::new(),
            deadline: deadline_after(Instant::now(), interval),
            seq: 0,
            timer_type: TimerType::Repeating { interval },
            trigger,
        }
    }

    /// Next occurrence of a repeating timer, measured from `now`
    ///
    /// Keeps the handle so the timer stays cancellable. Returns None for
    /// one-shot timers.
    pub fn reschedule(&self, now: Instant) -> Option<Self> {
        match self.timer_type {
            TimerType::Repeating { interval } => Some(Self {
                handle: self.handle,
                deadline: deadline_after(now, interval),
                seq: 0,
                timer_type: self.timer_type,
                trigger: Rc::clone(&self.trigger),
            }),
            TimerType::Once => None,
        }
    }
}

impl fmt::Debug for TimerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEntry")
            .field("handle", &self.handle)
            .field("deadline", &self.deadline)
            .field("seq", &self.seq)
            .field("timer_type", &self.timer_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Rc<dyn Trigger> {
        Rc::new(|| {})
    }

    #[test]
    fn test_handle_uniqueness() {
        let handles: Vec<_> = (0..1000).map(|_| TimerHandle::new()).collect();
        let unique: std::collections::HashSet<_> = handles.iter().collect();
        assert_eq!(handles.len(), unique.len());
    }

    #[test]
    fn test_repeating_reschedule_keeps_handle() {
        let interval = Duration::from_millis(100);
        let entry = TimerEntry::repeating(interval, noop());
        let now = Instant::now();

        let next = entry.reschedule(now).expect("should reschedule");
        assert_eq!(next.handle, entry.handle);
        assert_eq!(next.deadline, now + interval);
    }

    #[test]
    fn test_huge_delay_saturates() {
        let now = Instant::now();
        let deadline = deadline_after(now, Duration::MAX);
        assert!(deadline >= now + Duration::from_secs(365 * 24 * 60 * 60));

        let entry = TimerEntry::repeating(Duration::MAX, noop());
        let next = entry.reschedule(now).expect("should reschedule");
        assert!(next.deadline > now);
    }

    #[test]
    fn test_once_does_not_reschedule() {
        let entry = TimerEntry::once(Duration::from_millis(5), noop());
        assert!(entry.reschedule(Instant::now()).is_none());
        assert!(!entry.timer_type.is_repeating());
    }
}
