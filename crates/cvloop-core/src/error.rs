//! Error types for condition variables and the event loop boundary

use core::fmt;

/// Errors surfaced by [`CondVar::recv`](crate::condvar::CondVar::recv)
///
/// All of them are raised synchronously from `recv()`; `send`, `croak`,
/// `begin` and `end` never fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvError<E> {
    /// Another blocking wait is already pumping the event loop.
    ///
    /// The loop underneath is not safe to re-enter, so the nested
    /// wait fails fast. The outer wait is unaffected.
    ReentrantWait,

    /// The producer resolved the condition variable with `croak`.
    ///
    /// Returned on every `recv()` after the croak, not just the first.
    Croaked(E),

    /// The event loop ran out of work before the condition variable
    /// became ready.
    Exhausted,
}

impl<E> RecvError<E> {
    /// Check if this is the reentrancy failure
    #[inline]
    pub fn is_reentrant(&self) -> bool {
        matches!(self, RecvError::ReentrantWait)
    }

    /// Get the croaked payload, if any
    pub fn croaked(&self) -> Option<&E> {
        match self {
            RecvError::Croaked(e) => Some(e),
            _ => None,
        }
    }

    /// Consume the error, returning the croaked payload if any
    pub fn into_croaked(self) -> Option<E> {
        match self {
            RecvError::Croaked(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RecvError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecvError::ReentrantWait => write!(f, "recursive blocking wait attempted"),
            RecvError::Croaked(e) => write!(f, "{}", e),
            RecvError::Exhausted => {
                write!(f, "event loop ran out of work before the condvar was ready")
            }
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RecvError<E> {}

/// Errors from the event loop side of the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopError {
    /// The loop this handle pointed at has been dropped
    Closed,

    /// The loop is already being driven by a blocking wait
    Reentrant,
}

impl fmt::Display for LoopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopError::Closed => write!(f, "event loop closed"),
            LoopError::Reentrant => write!(f, "event loop is already being driven"),
        }
    }
}

impl std::error::Error for LoopError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e: RecvError<String> = RecvError::ReentrantWait;
        assert_eq!(format!("{}", e), "recursive blocking wait attempted");

        let e = RecvError::Croaked("boom".to_string());
        assert_eq!(format!("{}", e), "boom");

        assert_eq!(format!("{}", LoopError::Closed), "event loop closed");
    }

    #[test]
    fn test_croaked_accessors() {
        let e = RecvError::Croaked(7u32);
        assert_eq!(e.croaked(), Some(&7));
        assert!(!e.is_reentrant());
        assert_eq!(e.into_croaked(), Some(7));

        let e: RecvError<u32> = RecvError::ReentrantWait;
        assert!(e.is_reentrant());
        assert_eq!(e.into_croaked(), None);
    }
}
