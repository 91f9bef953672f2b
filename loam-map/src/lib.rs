//! A separate-chaining hash map stored entirely in stack-packed pools.
//!
//! [`LoamMap`] never asks the general-purpose allocator for per-record
//! storage. Records live in two [`loam`] pools: a bucket with exactly one
//! member references a bare record in the *entry pool*, and buckets with two
//! or more members chain cells from the *node pool*. Each bucket head
//! encodes which case applies in its two low pointer bits, so the
//! distinction costs no storage at all.
//!
//! The pools compact on every free, which keeps iteration and rehashing
//! proportional to the live record count. In exchange, records have no
//! stable address; the map repairs its bucket pointers whenever a pool
//! relocates a record underneath them.
//!
//! ```rust
//! use loam_map::LoamMap;
//!
//! let mut map: LoamMap<u64, u64> = LoamMap::new();
//! *map.get_or_insert(7) = 42;
//! assert_eq!(map.get(&7), Some(&42));
//! assert_eq!(map.remove(&7), Some(42));
//! assert!(map.is_empty());
//! ```

#![warn(missing_docs)]
#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

mod bucket;
mod error;
mod map;

pub use error::MapError;
pub use map::{Iter, Keys, LoamMap};
