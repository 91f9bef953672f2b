use core::fmt;

/// Returned when a pool cannot obtain backing storage from the system
/// allocator.
///
/// The operation that triggered the allocation has no partial effect: the
/// pools already constructed keep their contents, and no slot is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError;

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool backing storage allocation failed")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AllocError {}
