//! Linux futex-based loop parking
//!
//! Futex word semantics:
//! - 0 = no wake pending
//! - 1 = wake pending (the loop should re-check for work)
//!
//! `unpark()` always sets the word so a wake racing with the loop going
//! to sleep is not lost; FUTEX_WAIT only sleeps while the word is 0. The
//! FUTEX_WAKE syscall is skipped when nobody is parked.

use super::LoopParking;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

/// Linux futex-based parking
pub struct FutexParking {
    /// Futex word: 0 = sleep, 1 = wake pending
    futex: AtomicU32,

    /// 1 while the loop thread is inside `park()`
    parked: AtomicUsize,
}

impl FutexParking {
    pub fn new() -> Self {
        Self {
            futex: AtomicU32::new(0),
            parked: AtomicUsize::new(0),
        }
    }
}

impl Default for FutexParking {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopParking for FutexParking {
    fn park(&self, timeout: Option<Duration>) -> bool {
        // Consume a wake that arrived before we got here
        if self.futex.swap(0, Ordering::AcqRel) != 0 {
            return true;
        }

        self.parked.fetch_add(1, Ordering::SeqCst);

        let timespec = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
            tv_nsec: d.subsec_nanos() as libc::c_long,
        });
        let timespec_ptr = match &timespec {
            Some(ts) => ts as *const libc::timespec,
            None => std::ptr::null(),
        };

        // FUTEX_WAIT: sleep while futex == 0
        let result = unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.futex.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                0u32,
                timespec_ptr,
                std::ptr::null::<u32>(),
                0u32,
            )
        };

        self.parked.fetch_sub(1, Ordering::SeqCst);

        // EAGAIN means the word was already 1, which is still a wake
        let signalled = self.futex.swap(0, Ordering::AcqRel) != 0;
        if result == 0 {
            return signalled;
        }
        let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
        signalled || (errno != libc::ETIMEDOUT && errno != libc::EINTR && errno != libc::EAGAIN)
    }

    fn unpark(&self) {
        self.futex.store(1, Ordering::Release);

        if self.parked.load(Ordering::Acquire) == 0 {
            return;
        }

        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.futex.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                1i32,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }

    fn is_parked(&self) -> bool {
        self.parked.load(Ordering::Relaxed) != 0
    }
}
