//! # cvloop - condition variables for callback-driven code
//!
//! Lets code written in a blocking style ("wait here until the value
//! arrives") run on top of a single-threaded, callback-driven event loop.
//!
//! ## Features
//!
//! - **One-shot latch**: a [`CondVar`] becomes ready exactly once, through
//!   `send`, `croak` or a drained `begin`/`end` group
//! - **Blocking receive**: `recv()` pumps the loop one pass at a time until
//!   its own condition variable is ready
//! - **Callbacks**: subscribe with `set_cb` instead of waiting
//! - **Keepalive**: the loop is kept alive while condition variables are
//!   outstanding
//! - **Reentrancy guard**: a nested blocking wait fails with
//!   [`RecvError::ReentrantWait`] instead of re-entering the loop
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use cvloop::{CondVar, Runtime};
//!
//! let rt = Runtime::from_env();
//! let cv: CondVar<&str> = rt.condvar();
//!
//! let producer = cv.clone();
//! rt.set_timeout(Duration::from_millis(100), move || producer.send("x"));
//!
//! assert_eq!(cv.recv(), Ok(Some("x")));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │          send / croak / begin / end / recv / set_cb         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              CondVar  ──►  WaiterRegistry                   │
//! │       readiness latch      live count, keepalive, depth     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ EventLoop::run_once
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Scheduler                              │
//! │        tasks, timer heap, parking, remote injection         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::rc::Rc;
use std::time::Duration;

// Re-export core types
pub use cvloop_core::{
    Callback,
    CondVar,
    CvId,
    EventLoop,
    KeepaliveHandle,
    LoopError,
    PumpOutcome,
    RecvError,
    RegistryStats,
    Trigger,
    WaiterRegistry,
    pump_until,
};

// Re-export kprint macros for debug logging
pub use cvloop_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use cvloop_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled, set_time_enabled};

// Re-export env utilities
pub use cvloop_core::{env_get, env_get_bool, env_get_millis, env_get_opt};

// Re-export runtime types
pub use cvloop_runtime::{
    LoopConfig,
    Remote,
    Scheduler,
    SchedulerStats,
    TimerHandle,
    TimerStats,
};

/// A scheduler together with the registry its condition variables use
///
/// Everything here is single-threaded; a `Runtime` lives on the thread
/// that created it. Use [`Runtime::remote`] to post work from elsewhere.
pub struct Runtime {
    scheduler: Scheduler,
    registry: Rc<WaiterRegistry>,
}

impl Runtime {
    /// Create a runtime with the given configuration
    pub fn new(config: LoopConfig) -> Self {
        let keepalive_period = config.keepalive_period;
        let scheduler = Scheduler::new(config);
        let registry = Rc::new(WaiterRegistry::with_keepalive_period(
            Rc::new(scheduler.clone()),
            keepalive_period,
        ));
        kdebug!("cvloop: runtime created ({:?})", scheduler.config());
        Self { scheduler, registry }
    }

    /// Create a runtime configured from `CVL_*` environment variables
    pub fn from_env() -> Self {
        Self::new(LoopConfig::from_env())
    }

    /// Create a condition variable on this runtime
    pub fn condvar<T, E>(&self) -> CondVar<T, E> {
        CondVar::new(&self.registry)
    }

    /// Create a condition variable with a callback already registered
    pub fn condvar_with_cb<T, E, F>(&self, callback: F) -> CondVar<T, E>
    where
        F: Fn(&CondVar<T, E>) + 'static,
    {
        CondVar::with_callback(&self.registry, callback)
    }

    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[inline]
    pub fn registry(&self) -> &Rc<WaiterRegistry> {
        &self.registry
    }

    /// Fire `trigger` once after `delay`
    ///
    /// A [`CondVar`] is a valid trigger: it resolves with no value.
    pub fn set_timeout<T>(&self, delay: Duration, trigger: T) -> TimerHandle
    where
        T: Trigger + 'static,
    {
        self.scheduler.set_timeout(delay, trigger)
    }

    /// Fire `trigger` every `period` until cleared
    pub fn set_interval<T>(&self, period: Duration, trigger: T) -> TimerHandle
    where
        T: Trigger + 'static,
    {
        self.scheduler.set_interval(period, trigger)
    }

    pub fn clear_timer(&self, handle: TimerHandle) -> bool {
        self.scheduler.clear_timer(handle)
    }

    /// Queue `task` for the next loop pass
    pub fn next_tick<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.scheduler.next_tick(task)
    }

    /// Get a `Send` handle for posting work from other threads
    pub fn remote(&self) -> Remote {
        self.scheduler.remote()
    }

    /// Drive the loop until it has no more work
    ///
    /// This is itself a blocking wait: a `recv()` from inside one of the
    /// callbacks that would need to pump fails with
    /// [`RecvError::ReentrantWait`]. Fails with [`LoopError::Reentrant`]
    /// when called while a `recv()` is already pumping the loop.
    pub fn run(&self) -> Result<u64, LoopError> {
        self.registry.drive()
    }

    /// Release the keepalive so the loop can wind down
    pub fn force_stop(&self) {
        self.registry.force_stop()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::from_env()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("scheduler", &self.scheduler)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::time::Instant;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn runtime() -> Runtime {
        Runtime::new(LoopConfig::new())
    }

    #[test]
    fn test_send_from_timer() {
        let rt = runtime();
        let cv: CondVar<&'static str> = rt.condvar();
        assert!(!cv.ready());

        let producer = cv.clone();
        rt.set_timeout(ms(100), move || producer.send("x"));

        let start = Instant::now();
        assert_eq!(cv.recv(), Ok(Some("x")));
        assert!(start.elapsed() >= ms(100));
        assert!(cv.ready());
    }

    #[test]
    fn test_croak_is_raised_every_time() {
        let rt = runtime();
        let cv: CondVar<u32> = rt.condvar();
        cv.croak("boom".to_string());

        assert_eq!(cv.recv(), Err(RecvError::Croaked("boom".to_string())));
        assert_eq!(cv.recv(), Err(RecvError::Croaked("boom".to_string())));
        assert_eq!(cv.error().as_deref(), Some("boom"));
    }

    #[test]
    fn test_croak_from_timer() {
        let rt = runtime();
        let cv: CondVar<u32> = rt.condvar();
        let producer = cv.clone();
        rt.set_timeout(ms(20), move || producer.croak("cv2value".to_string()));

        let err = cv.recv().unwrap_err();
        assert_eq!(err.to_string(), "cv2value");
    }

    #[test]
    fn test_nested_recv_is_rejected() {
        let rt = runtime();
        let cv1: CondVar<i32> = rt.condvar();
        let cv2: CondVar<i32> = rt.condvar();
        let nested = Rc::new(RefCell::new(None));

        {
            let (cv1, cv2, nested) = (cv1.clone(), cv2.clone(), nested.clone());
            rt.set_timeout(ms(100), move || {
                *nested.borrow_mut() = Some(cv2.recv());
                cv1.send(1);
            });
        }
        {
            let cv2 = cv2.clone();
            rt.set_timeout(ms(200), move || cv2.send(2));
        }

        assert_eq!(cv1.recv(), Ok(Some(1)));
        assert_eq!(*nested.borrow(), Some(Err(RecvError::ReentrantWait)));
        assert!(!cv2.ready());
        assert_eq!(rt.registry().blocking_depth(), 0);

        // The outer wait is unaffected; cv2 still arrives later
        assert_eq!(cv2.recv(), Ok(Some(2)));
        assert_eq!(cv1.recv(), Ok(Some(1)));
    }

    #[test]
    fn test_group_resolves_after_last_end() {
        let rt = runtime();
        let cv: CondVar<String> = rt.condvar();
        cv.begin();
        cv.begin();

        let ends = Rc::new(Cell::new(0));
        for delay in [100, 200] {
            let (cv, ends) = (cv.clone(), ends.clone());
            rt.set_timeout(ms(delay), move || {
                ends.set(ends.get() + 1);
                cv.end();
            });
        }

        assert_eq!(cv.recv(), Ok(None));
        assert_eq!(ends.get(), 2);
        assert_eq!(cv.pending(), 0);
    }

    #[test]
    fn test_group_end_callback_sends_value() {
        let rt = runtime();
        let cv: CondVar<&'static str> = rt.condvar();
        let fired = Rc::new(Cell::new(false));
        {
            let fired = fired.clone();
            cv.begin_with(move |cv| {
                fired.set(true);
                cv.send("x");
            });
        }
        cv.begin();
        cv.begin();
        for delay in [10, 20, 30] {
            let cv = cv.clone();
            rt.set_timeout(ms(delay), move || cv.end());
        }

        assert_eq!(cv.recv(), Ok(Some("x")));
        assert!(fired.get());
    }

    #[test]
    fn test_condvar_as_timer_trigger() {
        let rt = runtime();
        let cv: CondVar<i32> = rt.condvar();
        rt.set_timeout(ms(10), cv.clone());
        assert_eq!(cv.recv(), Ok(None));
    }

    #[test]
    fn test_callback_runs_from_run() {
        let rt = runtime();
        let got = Rc::new(RefCell::new(None));
        let cv: CondVar<&'static str> = {
            let got = got.clone();
            rt.condvar_with_cb(move |cv: &CondVar<&'static str>| {
                // Already ready, so this does not pump
                *got.borrow_mut() = Some(cv.recv());
            })
        };
        let producer = cv.clone();
        rt.set_timeout(ms(20), move || producer.send("cb result"));

        assert!(rt.run().is_ok());
        assert_eq!(*got.borrow(), Some(Ok(Some("cb result"))));
        assert!(!rt.registry().keepalive_active());
    }

    #[test]
    fn test_recv_inside_run_is_rejected() {
        let rt = runtime();
        let result = Rc::new(RefCell::new(None));
        let cv: CondVar<&'static str> = rt.condvar();
        {
            let (cv, result) = (cv.clone(), result.clone());
            rt.next_tick(move || *result.borrow_mut() = Some(cv.recv()));
        }
        let producer = cv.clone();
        rt.set_timeout(ms(20), move || producer.send("nextTick result"));

        assert!(rt.run().is_ok());
        assert_eq!(*result.borrow(), Some(Err(RecvError::ReentrantWait)));
        assert_eq!(cv.recv(), Ok(Some("nextTick result")));
    }

    #[test]
    fn test_run_while_waiting_fails() {
        let rt = Rc::new(runtime());
        let cv: CondVar<()> = rt.condvar();
        let nested = Rc::new(Cell::new(None));
        {
            let (rt2, cv, nested) = (rt.clone(), cv.clone(), nested.clone());
            rt.set_timeout(ms(5), move || {
                nested.set(Some(rt2.run()));
                cv.send(());
            });
        }
        assert_eq!(cv.recv(), Ok(Some(())));
        assert_eq!(nested.get(), Some(Err(LoopError::Reentrant)));
    }

    #[test]
    fn test_keepalive_tracks_outstanding_condvars() {
        let rt = runtime();
        let a: CondVar<i32> = rt.condvar();
        let b: CondVar<i32> = rt.condvar();
        assert!(rt.registry().keepalive_active());
        assert_eq!(rt.scheduler().active_timers(), 1);

        a.send(1);
        b.send(2);
        assert_eq!(a.recv(), Ok(Some(1)));
        assert!(rt.registry().keepalive_active());
        assert_eq!(b.recv(), Ok(Some(2)));
        assert!(!rt.registry().keepalive_active());
        assert_eq!(rt.scheduler().active_timers(), 0);
    }

    #[test]
    fn test_keepalive_churn_keeps_timer_heap_bounded() {
        let rt = runtime();
        rt.set_interval(Duration::from_secs(3600), || {});

        for i in 0..10_000u32 {
            let cv: CondVar<u32> = rt.condvar();
            cv.send(i);
            assert_eq!(cv.recv(), Ok(Some(i)));
        }

        let stats = rt.scheduler().timer_stats();
        assert_eq!(stats.active, 1);
        assert!(stats.heap_entries < 100, "heap grew to {}", stats.heap_entries);
    }

    #[test]
    fn test_set_timeout_accepts_max_duration() {
        let rt = runtime();
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        let handle = rt.set_timeout(Duration::MAX, move || f.set(true));

        rt.next_tick(|| {});
        assert!(rt.scheduler().run_once());
        assert!(!fired.get());
        assert!(rt.clear_timer(handle));
    }

    #[test]
    fn test_exhausted_after_force_stop() {
        let rt = runtime();
        let cv: CondVar<i32> = rt.condvar();
        rt.force_stop();
        assert_eq!(cv.recv(), Err(RecvError::Exhausted));
    }

    #[test]
    fn test_waits_are_per_handle() {
        let rt = runtime();
        let cvs: Vec<CondVar<&'static str>> = (0..3).map(|_| rt.condvar()).collect();
        for (cv, (delay, value)) in cvs.iter().zip([(200, "asdf1"), (100, "asdf2"), (100, "asdf3")]) {
            let cv = cv.clone();
            rt.set_timeout(ms(delay), move || cv.send(value));
        }

        assert_eq!(cvs[0].recv(), Ok(Some("asdf1")));
        assert!(cvs[1].ready());
        assert!(cvs[2].ready());
        assert_eq!(cvs[1].recv(), Ok(Some("asdf2")));
        assert_eq!(cvs[2].recv(), Ok(Some("asdf3")));
    }

    #[test]
    fn test_remote_post_reaches_loop() {
        let rt = runtime();
        let remote = rt.remote();
        let (tx, rx) = std::sync::mpsc::channel();

        let worker = std::thread::spawn(move || {
            std::thread::sleep(ms(10));
            let _ = remote.post(move || {
                let _ = tx.send(42);
            });
        });

        assert!(rt.run().is_ok());
        worker.join().unwrap();
        assert_eq!(rx.try_recv(), Ok(42));
    }
}
