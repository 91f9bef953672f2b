use core::fmt;

use loam::AllocError;

/// Typed errors for map operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// The key is not in the map.
    NotFound,
    /// A pool could not obtain backing storage. The operation that needed
    /// the allocation left the map unchanged.
    CapacityExhausted,
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::NotFound => write!(f, "key not found"),
            MapError::CapacityExhausted => write!(f, "pool backing storage exhausted"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MapError {}

impl From<AllocError> for MapError {
    fn from(_: AllocError) -> Self {
        MapError::CapacityExhausted
    }
}
