//! Condition variable identifier type

use core::fmt;

/// Identifier of a condition variable
///
/// Assigned from the owning registry's creation counter. Purely
/// informational: nothing in the wait protocol keys off it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct CvId(u64);

impl CvId {
    /// Create a new CvId from a raw value
    #[inline]
    pub const fn new(id: u64) -> Self {
        CvId(id)
    }

    /// Get the raw u64 value
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for CvId {
    #[inline]
    fn from(id: u64) -> Self {
        CvId(id)
    }
}

impl From<CvId> for u64 {
    #[inline]
    fn from(id: CvId) -> Self {
        id.0
    }
}

impl fmt::Debug for CvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CvId({})", self.0)
    }
}

impl fmt::Display for CvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cv#{}", self.0)
    }
}
