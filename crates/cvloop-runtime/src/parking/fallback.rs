//! Fallback parking using std::sync::Condvar
//!
//! Used on platforms without futex support.

use super::LoopParking;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Condvar-based parking (fallback)
pub struct FallbackParking {
    /// wake pending
    mutex: Mutex<bool>,
    condvar: Condvar,
    parked: AtomicBool,
}

impl FallbackParking {
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(false),
            condvar: Condvar::new(),
            parked: AtomicBool::new(false),
        }
    }
}

impl Default for FallbackParking {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopParking for FallbackParking {
    fn park(&self, timeout: Option<Duration>) -> bool {
        let mut guard = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);

        if *guard {
            *guard = false;
            return true;
        }

        self.parked.store(true, Ordering::SeqCst);
        guard = match timeout {
            Some(t) => {
                self.condvar
                    .wait_timeout(guard, t)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
            None => self.condvar.wait(guard).unwrap_or_else(PoisonError::into_inner),
        };
        self.parked.store(false, Ordering::SeqCst);

        std::mem::replace(&mut *guard, false)
    }

    fn unpark(&self) {
        {
            let mut guard = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
            *guard = true;
        }
        self.condvar.notify_one();
    }

    fn is_parked(&self) -> bool {
        self.parked.load(Ordering::Relaxed)
    }
}
