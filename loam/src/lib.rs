//! Loam: stack-packed object pools with relocation hints.
//!
//! A [`StackPool`] is a fixed-capacity slab that keeps its live objects
//! densely packed: freeing any slot moves the slab's top object into the
//! hole, so the live objects always occupy a contiguous prefix and iteration
//! costs O(live count), never O(capacity). The price is address stability.
//! Every free may relocate one other object, and the pool reports the move
//! to the caller as a [`Relocation`] hint that names the invalidated
//! address.
//!
//! A [`Cascade`] chains any number of pools into a single unbounded
//! allocator. The front pool is the allocation target; when it fills, the
//! first pool with room is swapped to the front, and a fresh pool is created
//! only once every existing pool is full. A [`Cursor`] sweeps all live slots
//! while removing some of them, which is how a caller drains a cascade
//! without ever visiting a stale slot.
//!
//! # Example
//!
//! ```rust
//! use loam::StackPool;
//!
//! let mut pool: StackPool<u32> = StackPool::with_capacity(4);
//! let a = pool.alloc(1).unwrap();
//! let _b = pool.alloc(2).unwrap();
//! let _c = pool.alloc(3).unwrap();
//!
//! // Freeing `a` moves the top object (3) into its slot.
//! unsafe {
//!     core::ptr::drop_in_place(a.as_ptr());
//!     let moved = pool.deallocate(a);
//!     assert!(moved.is_some());
//! }
//! assert_eq!(pool.as_slice(), &[3, 2]);
//! ```

#![warn(missing_docs)]
#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

mod cascade;
mod error;
mod pool;

pub use cascade::{Cascade, Cursor, Iter};
pub use error::AllocError;
pub use pool::{Relocation, StackPool};

/// Memory page size assumed when sizing default slabs.
pub const PAGE_SIZE: usize = 4096;

/// Pages per default-sized slab. 256 pages of 4 KiB give 1 MiB slabs, large
/// enough to amortise fresh-pool construction during bulk insertion.
pub const SLAB_PAGES: usize = 256;
