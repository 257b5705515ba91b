//! Main scheduler implementation
//!
//! A single-threaded cooperative event loop. One pass (`run_once`) does,
//! in order:
//!
//! 1. Drain work posted through [`Remote`] handles
//! 2. Park the thread if nothing is runnable and no timer is due
//! 3. Run the tasks that were queued when the pass started
//! 4. Fire every timer whose deadline has passed, earliest first
//!
//! Callbacks may schedule further work on the same scheduler; no borrow
//! of internal state is held while user code runs.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cvloop_core::{kdebug, ktrace, EventLoop, KeepaliveHandle, Trigger};

use crate::config::{defaults, LoopConfig};
use crate::parking::new_parking;
use crate::remote::{Remote, RemoteShared};
use crate::timer::{TimerHandle, TimerQueue, TimerStats};
use crate::timer::TimerEntry;

type Task = Box<dyn FnOnce() + 'static>;

struct SchedulerInner {
    config: LoopConfig,

    /// Immediately runnable tasks (`next_tick` and drained remote posts)
    tasks: RefCell<VecDeque<Task>>,

    timers: RefCell<TimerQueue>,

    remote: Arc<RemoteShared>,

    // Stats
    passes: Cell<u64>,
    tasks_run: Cell<u64>,
    timers_fired: Cell<u64>,
    parks: Cell<u64>,
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        self.remote.close();
        kdebug!(
            "cvloop: scheduler dropped after {} passes",
            self.passes.get()
        );
    }
}

/// Single-threaded event loop
///
/// Cloning gives another handle to the same loop. The scheduler is
/// `!Send`; use [`Scheduler::remote`] to reach it from other threads.
///
/// # Example
///
/// ```rust,ignore
/// let sched = Scheduler::new(LoopConfig::new());
/// sched.set_timeout(Duration::from_millis(10), || println!("tick"));
/// sched.run();
/// ```
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    /// Create a new scheduler with the given configuration
    pub fn new(config: LoopConfig) -> Self {
        let timers = TimerQueue::with_capacity(config.timer_capacity);
        Self {
            inner: Rc::new(SchedulerInner {
                config,
                tasks: RefCell::new(VecDeque::new()),
                timers: RefCell::new(timers),
                remote: Arc::new(RemoteShared::new(new_parking())),
                passes: Cell::new(0),
                tasks_run: Cell::new(0),
                timers_fired: Cell::new(0),
                parks: Cell::new(0),
            }),
        }
    }

    /// Create a scheduler configured from `CVL_*` environment variables
    pub fn from_env() -> Self {
        Self::new(LoopConfig::from_env())
    }

    /// Get the configuration
    pub fn config(&self) -> &LoopConfig {
        &self.inner.config
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Fire `trigger` once after `delay`
    pub fn set_timeout<T>(&self, delay: Duration, trigger: T) -> TimerHandle
    where
        T: Trigger + 'static,
    {
        let entry = TimerEntry::once(delay, Rc::new(trigger));
        ktrace!("cvloop: timeout {} in {:?}", entry.handle.raw(), delay);
        self.inner.timers.borrow_mut().insert(entry)
    }

    /// Fire `trigger` every `period` until cleared
    ///
    /// Periods below one millisecond are raised to one millisecond.
    pub fn set_interval<T>(&self, period: Duration, trigger: T) -> TimerHandle
    where
        T: Trigger + 'static,
    {
        let period = period.max(Duration::from_millis(defaults::MIN_INTERVAL_MS));
        let entry = TimerEntry::repeating(period, Rc::new(trigger));
        ktrace!("cvloop: interval {} every {:?}", entry.handle.raw(), period);
        self.inner.timers.borrow_mut().insert(entry)
    }

    /// Cancel a timer
    ///
    /// Returns false if it already fired (one-shot) or was cleared. Safe
    /// to call from inside the timer's own trigger.
    pub fn clear_timer(&self, handle: TimerHandle) -> bool {
        self.inner.timers.borrow_mut().cancel(handle)
    }

    /// Queue `task` to run during the next pass
    pub fn next_tick<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.inner.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Get a `Send` handle for posting work from other threads
    pub fn remote(&self) -> Remote {
        Remote::new(Arc::clone(&self.inner.remote))
    }

    // ========================================================================
    // Driving
    // ========================================================================

    /// Whether any queued task, active timer or live remote handle exists
    pub fn has_pending(&self) -> bool {
        !self.inner.tasks.borrow().is_empty()
            || !self.inner.timers.borrow().is_empty()
            || self.inner.remote.live_handles() > 0
            || self.inner.remote.queued() > 0
    }

    /// Run one pass of the loop
    ///
    /// Blocks until something is due if nothing is runnable yet. Returns
    /// `false` without blocking when there is no pending work at all;
    /// otherwise returns [`has_pending`](Self::has_pending) after the
    /// pass.
    pub fn run_once(&self) -> bool {
        let inner = &self.inner;
        inner.passes.set(inner.passes.get() + 1);

        self.drain_remote();
        if !self.has_pending() {
            return false;
        }

        if inner.tasks.borrow().is_empty() {
            self.park_until_due();
            self.drain_remote();
        }

        // Only tasks queued before this point run in this pass
        let budget = inner.tasks.borrow().len().min(inner.config.max_tasks_per_pass);
        for _ in 0..budget {
            let task = inner.tasks.borrow_mut().pop_front();
            match task {
                Some(task) => {
                    task();
                    inner.tasks_run.set(inner.tasks_run.get() + 1);
                }
                None => break,
            }
        }

        let now = Instant::now();
        loop {
            let fired = inner.timers.borrow_mut().pop_expired(now);
            match fired {
                Some(fired) => {
                    ktrace!("cvloop: timer {} fired", fired.handle.raw());
                    fired.trigger.trigger();
                    inner.timers_fired.set(inner.timers_fired.get() + 1);
                }
                None => break,
            }
        }

        self.has_pending()
    }

    /// Run passes until the loop has no pending work
    ///
    /// Returns the number of passes made.
    pub fn run(&self) -> u64 {
        let mut passes = 0;
        while self.run_once() {
            passes += 1;
        }
        passes + 1
    }

    fn drain_remote(&self) {
        let remote = &self.inner.remote;
        let mut tasks = self.inner.tasks.borrow_mut();
        while let Some(task) = remote.pop() {
            tasks.push_back(task);
        }
    }

    fn park_until_due(&self) {
        let inner = &self.inner;
        let next = inner.timers.borrow_mut().next_deadline();
        let timeout = match next {
            Some(deadline) => {
                let now = Instant::now();
                if deadline <= now {
                    return;
                }
                (deadline - now).min(inner.config.max_park)
            }
            // Only remote handles keep the loop alive
            None => inner.config.max_park,
        };
        inner.parks.set(inner.parks.get() + 1);
        inner.remote.parking().park(Some(timeout));
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Tasks waiting for the next pass (remote posts not yet drained excluded)
    pub fn queued_tasks(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    /// Live timers, keepalives included
    pub fn active_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    pub fn timer_stats(&self) -> TimerStats {
        self.inner.timers.borrow().stats()
    }

    /// Get statistics snapshot
    pub fn stats(&self) -> SchedulerStats {
        let inner = &self.inner;
        SchedulerStats {
            passes: inner.passes.get(),
            tasks_run: inner.tasks_run.get(),
            timers_fired: inner.timers_fired.get(),
            parks: inner.parks.get(),
            remote_posts: inner.remote.total_posted() as u64,
            remote_handles: inner.remote.live_handles(),
        }
    }
}

impl EventLoop for Scheduler {
    fn run_once(&self) -> bool {
        Scheduler::run_once(self)
    }

    fn schedule_keepalive(&self, period: Duration) -> KeepaliveHandle {
        let handle = self.set_interval(period, || {});
        KeepaliveHandle(handle.raw())
    }

    fn cancel_keepalive(&self, handle: KeepaliveHandle) {
        self.clear_timer(TimerHandle(handle.raw()));
    }

    fn name(&self) -> &'static str {
        "cvloop-scheduler"
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Snapshot of scheduler counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    /// `run_once` calls
    pub passes: u64,
    pub tasks_run: u64,
    pub timers_fired: u64,
    /// Times the loop thread went to sleep
    pub parks: u64,
    pub remote_posts: u64,
    pub remote_handles: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn scheduler() -> Scheduler {
        Scheduler::new(LoopConfig::new())
    }

    #[test]
    fn test_idle_loop_returns_immediately() {
        let sched = scheduler();
        let start = Instant::now();
        assert!(!sched.run_once());
        assert_eq!(sched.run(), 1);
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(sched.stats().parks, 0);
    }

    #[test]
    fn test_next_tick_runs_in_order() {
        let sched = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            sched.next_tick(move || log.borrow_mut().push(i));
        }
        assert!(!sched.run_once());
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(sched.stats().tasks_run, 3);
    }

    #[test]
    fn test_tasks_queued_during_pass_wait_for_next_pass() {
        let sched = scheduler();
        let hits = Rc::new(Cell::new(0));

        let s = sched.clone();
        let h = hits.clone();
        sched.next_tick(move || {
            h.set(h.get() + 1);
            let h = h.clone();
            s.next_tick(move || h.set(h.get() + 10));
        });

        assert!(sched.run_once());
        assert_eq!(hits.get(), 1);
        assert!(!sched.run_once());
        assert_eq!(hits.get(), 11);
    }

    #[test]
    fn test_max_tasks_per_pass() {
        let sched = Scheduler::new(LoopConfig::new().max_tasks_per_pass(2));
        for _ in 0..5 {
            sched.next_tick(|| {});
        }
        assert!(sched.run_once());
        assert_eq!(sched.queued_tasks(), 3);
        assert!(sched.run_once());
        assert!(!sched.run_once());
        assert_eq!(sched.stats().tasks_run, 5);
    }

    #[test]
    fn test_timeout_parks_then_fires() {
        let sched = scheduler();
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();

        let start = Instant::now();
        sched.set_timeout(Duration::from_millis(30), move || f.set(true));
        sched.run();

        assert!(fired.get());
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(sched.stats().parks >= 1);
        assert_eq!(sched.active_timers(), 0);
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let sched = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (delay, tag) in [(30u64, 'c'), (10, 'a'), (20, 'b')] {
            let log = log.clone();
            sched.set_timeout(Duration::from_millis(delay), move || log.borrow_mut().push(tag));
        }
        sched.run();
        assert_eq!(*log.borrow(), vec!['a', 'b', 'c']);
    }

    #[test]
    fn test_interval_cleared_from_own_callback() {
        let sched = scheduler();
        let count = Rc::new(Cell::new(0));
        let handle = Rc::new(Cell::new(None));

        let s = sched.clone();
        let c = count.clone();
        let h = handle.clone();
        let id = sched.set_interval(Duration::from_millis(5), move || {
            c.set(c.get() + 1);
            if c.get() == 3 {
                if let Some(id) = h.get() {
                    assert!(s.clear_timer(id));
                }
            }
        });
        handle.set(Some(id));

        sched.run();
        assert_eq!(count.get(), 3);
        assert!(!sched.clear_timer(id));
    }

    #[test]
    fn test_interval_period_is_clamped() {
        let sched = scheduler();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let s = sched.clone();
        let id = Rc::new(Cell::new(None));
        let i = id.clone();
        let handle = sched.set_interval(Duration::ZERO, move || {
            c.set(c.get() + 1);
            if let Some(h) = i.get() {
                s.clear_timer(h);
            }
        });
        id.set(Some(handle));

        // A zero period must not fire again within the same pass
        while sched.run_once() {}
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_max_delay_timeout_never_fires() {
        let sched = scheduler();
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        let handle = sched.set_timeout(Duration::MAX, move || f.set(true));
        sched.set_interval(Duration::MAX, || {});

        for _ in 0..3 {
            sched.next_tick(|| {});
            assert!(sched.run_once());
        }
        assert!(!fired.get());
        assert_eq!(sched.active_timers(), 2);
        assert_eq!(sched.stats().timers_fired, 0);
        assert!(sched.clear_timer(handle));
    }

    #[test]
    fn test_trigger_object_as_timer_callback() {
        struct Flag(Rc<Cell<bool>>);
        impl Trigger for Flag {
            fn trigger(&self) {
                self.0.set(true);
            }
        }

        let sched = scheduler();
        let flag = Rc::new(Cell::new(false));
        sched.set_timeout(Duration::ZERO, Flag(flag.clone()));
        sched.run();
        assert!(flag.get());
    }

    #[test]
    fn test_keepalive_keeps_loop_pending() {
        let sched = scheduler();
        let ka = sched.schedule_keepalive(Duration::from_secs(3600));
        assert!(sched.has_pending());
        sched.next_tick(|| {});
        assert!(EventLoop::run_once(&sched));

        sched.cancel_keepalive(ka);
        assert!(!sched.has_pending());
        assert!(!sched.run_once());
    }

    #[test]
    fn test_remote_post_wakes_loop() {
        let sched = scheduler();
        let remote = sched.remote();
        let got = Rc::new(Cell::new(0u32));

        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.post(|| {}).unwrap();
            // remote dropped here, releasing the loop
        });

        let g = got.clone();
        sched.next_tick(move || g.set(1));
        sched.run();
        worker.join().unwrap();

        assert_eq!(got.get(), 1);
        let stats = sched.stats();
        assert_eq!(stats.remote_posts, 1);
        assert_eq!(stats.remote_handles, 0);
        assert_eq!(stats.tasks_run, 2);
    }

    #[test]
    fn test_live_remote_counts_as_pending() {
        let sched = scheduler();
        let remote = sched.remote();
        assert!(sched.has_pending());
        drop(remote);
        assert!(!sched.has_pending());
    }

    #[test]
    fn test_post_after_drop_fails() {
        let sched = scheduler();
        let remote = sched.remote();
        drop(sched);
        assert_eq!(remote.post(|| {}), Err(cvloop_core::LoopError::Closed));
    }
}
