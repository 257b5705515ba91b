//! Pump adapter - cooperative driving of an external event loop
//!
//! A blocking wait never parks the thread itself. It repeatedly asks the
//! loop to run one pass, checking its own condition after each pass.

use crate::traits::EventLoop;

/// Why pumping stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// The condition became true
    Ready { passes: u64 },
    /// The loop reported no further work while the condition was false
    Exhausted { passes: u64 },
}

impl PumpOutcome {
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, PumpOutcome::Ready { .. })
    }

    /// Number of `run_once` calls made
    #[inline]
    pub fn passes(&self) -> u64 {
        match *self {
            PumpOutcome::Ready { passes } | PumpOutcome::Exhausted { passes } => passes,
        }
    }
}

/// Run loop passes until `ready()` holds or the loop runs out of work
///
/// Always runs at least one pass. When a pass both satisfies the
/// condition and drains the loop, the outcome is `Ready`.
pub fn pump_until<L, F>(event_loop: &L, mut ready: F) -> PumpOutcome
where
    L: EventLoop + ?Sized,
    F: FnMut() -> bool,
{
    let mut passes = 0u64;
    loop {
        let more = event_loop.run_once();
        passes += 1;
        if ready() {
            return PumpOutcome::Ready { passes };
        }
        if !more {
            return PumpOutcome::Exhausted { passes };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLoop;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_stops_when_condition_holds() {
        let lp = ScriptedLoop::new();
        let flag = Rc::new(Cell::new(false));
        lp.push(|| {});
        let f = flag.clone();
        lp.push(move || f.set(true));
        lp.push(|| {});

        let outcome = pump_until(&lp, || flag.get());
        assert_eq!(outcome, PumpOutcome::Ready { passes: 2 });
        assert_eq!(lp.queued(), 1);
    }

    #[test]
    fn test_stops_when_loop_drains() {
        let lp = ScriptedLoop::new();
        lp.push(|| {});
        lp.push(|| {});

        let outcome = pump_until(&lp, || false);
        assert!(!outcome.is_ready());
        assert_eq!(outcome.passes(), 2);
    }

    #[test]
    fn test_empty_loop_still_runs_one_pass() {
        let lp = ScriptedLoop::new();
        assert_eq!(pump_until(&lp, || false), PumpOutcome::Exhausted { passes: 1 });
        assert_eq!(lp.passes(), 1);
    }
}
