//! Cascading pool allocator: a list of stack pools acting as one unbounded
//! allocator.

use alloc::vec::Vec;
use core::fmt;
use core::ptr::NonNull;
use core::slice;

use crate::error::AllocError;
use crate::pool::{Relocation, StackPool};

/// An unbounded allocator built from fixed-capacity [`StackPool`]s.
///
/// At least one pool always exists. The front pool is the allocation target;
/// when an allocation lands in a different pool, that pool is swapped to the
/// front so subsequent allocations hit it directly. A fresh pool is
/// constructed only when every existing pool is full.
///
/// Freeing goes through [`deallocate`](Cascade::deallocate) and
/// [`destroy`](Cascade::destroy), which locate the owning pool and forward
/// the call, propagating the pool's [`Relocation`] hint.
pub struct Cascade<T> {
    pools: Vec<StackPool<T>>,
    pool_cap: usize,
}

impl<T> Cascade<T> {
    /// Creates a cascade whose pools use
    /// [`StackPool::DEFAULT_CAPACITY`] slots each.
    pub fn new() -> Self {
        Self::with_pool_capacity(StackPool::<T>::DEFAULT_CAPACITY)
    }

    /// Creates a cascade whose pools hold `pool_cap` objects each.
    ///
    /// # Panics
    /// Panics if `pool_cap` is zero or `T` is zero-sized, and aborts on
    /// allocation failure.
    pub fn with_pool_capacity(pool_cap: usize) -> Self {
        let mut pools = Vec::with_capacity(16);
        pools.push(StackPool::with_capacity(pool_cap));
        Self { pools, pool_cap }
    }

    /// Slot capacity of each constituent pool.
    #[inline]
    pub fn pool_capacity(&self) -> usize {
        self.pool_cap
    }

    /// Number of pools currently owned, full or not.
    #[inline]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Total number of live objects across all pools.
    pub fn len(&self) -> usize {
        self.pools.iter().map(StackPool::len).sum()
    }

    /// Total slot capacity across all pools.
    pub fn capacity(&self) -> usize {
        self.pools.len() * self.pool_cap
    }

    /// Returns `true` if no pool holds a live object.
    pub fn is_empty(&self) -> bool {
        self.pools.iter().all(StackPool::is_empty)
    }

    /// Moves `value` into a free slot and returns its address.
    ///
    /// Tries the front pool, then the remaining pools (swapping the first
    /// one with room to the front), and finally constructs a new pool. The
    /// error case drops `value`: it only occurs when the system allocator
    /// refuses to back a fresh pool, and nothing has been inserted.
    pub fn try_alloc(&mut self, value: T) -> Result<NonNull<T>, AllocError> {
        // Hot path: the front pool usually has room.
        let mut value = match self.pools[0].alloc(value) {
            Ok(p) => return Ok(p),
            Err(v) => v,
        };
        for i in 1..self.pools.len() {
            match self.pools[i].alloc(value) {
                Ok(p) => {
                    self.pools.swap(0, i);
                    return Ok(p);
                }
                Err(v) => value = v,
            }
        }
        let mut fresh = StackPool::try_with_capacity(self.pool_cap)?;
        let Ok(p) = fresh.alloc(value) else {
            unreachable!("a fresh pool always has room");
        };
        self.pools.push(fresh);
        let last = self.pools.len() - 1;
        self.pools.swap(0, last);
        Ok(p)
    }

    /// Releases the slot at `p` without dropping its contents, forwarding to
    /// the owning pool.
    ///
    /// # Safety
    /// Some pool of this cascade must own `p`, the object must already have
    /// been moved out, and the relocation contract of
    /// [`StackPool::deallocate`] applies.
    #[must_use = "a relocation leaves dangling pointers until patched"]
    pub unsafe fn deallocate(&mut self, p: NonNull<T>) -> Option<Relocation<T>> {
        for pool in &mut self.pools {
            if pool.owns(p) {
                // SAFETY: forwarded precondition; `pool` is the owner.
                return unsafe { pool.deallocate(p) };
            }
        }
        debug_assert!(false, "deallocate of a pointer no pool owns");
        None
    }

    /// Drops the object at `p` and releases its slot, forwarding to the
    /// owning pool.
    ///
    /// # Safety
    /// Some pool of this cascade must own `p` and the slot must hold a live
    /// object. The relocation contract of [`StackPool::destroy`] applies.
    #[must_use = "a relocation leaves dangling pointers until patched"]
    pub unsafe fn destroy(&mut self, p: NonNull<T>) -> Option<Relocation<T>> {
        for pool in &mut self.pools {
            if pool.owns(p) {
                // SAFETY: forwarded precondition; `pool` is the owner.
                return unsafe { pool.destroy(p) };
            }
        }
        debug_assert!(false, "destroy of a pointer no pool owns");
        None
    }

    /// Drops every pool, live objects included, and reinitialises the
    /// cascade with a single empty pool.
    pub fn clear(&mut self) {
        self.pools.clear();
        self.pools.push(StackPool::with_capacity(self.pool_cap));
    }

    /// Ensures at least `additional` further objects can be allocated
    /// without touching the system allocator, appending empty pools as
    /// needed.
    ///
    /// On failure the pools already appended are kept; no live object is
    /// affected either way.
    pub fn reserve(&mut self, additional: usize) -> Result<(), AllocError> {
        let mut spare: usize = self
            .pools
            .iter()
            .map(|p| p.capacity() - p.len())
            .sum();
        while spare < additional {
            self.pools.push(StackPool::try_with_capacity(self.pool_cap)?);
            spare += self.pool_cap;
        }
        Ok(())
    }

    /// Iterates every live object, pool by pool in list order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            pools: self.pools.iter(),
            cur: [].iter(),
        }
    }

    /// Resolves `cursor` to the next live slot, skipping exhausted pools, or
    /// returns `None` when the sweep is complete.
    pub fn peek(&self, cursor: &mut Cursor) -> Option<NonNull<T>> {
        while let Some(pool) = self.pools.get(cursor.pool) {
            if cursor.slot < pool.len() {
                return Some(pool.slot(cursor.slot));
            }
            cursor.pool += 1;
            cursor.slot = 0;
        }
        None
    }

    /// Frees the slot under `cursor` without dropping it and without
    /// advancing.
    ///
    /// The hole is refilled from the owning pool's top, and because the
    /// cursor stays put the sweep revisits the refilled slot next. That
    /// revisit is what stands in for the usual relocation hint, so none is
    /// returned here.
    ///
    /// # Safety
    /// `cursor` must have just been resolved by [`Cascade::peek`] on this
    /// cascade, with no intervening mutation, and the object in the slot
    /// must already have been moved out.
    pub unsafe fn remove_current(&mut self, cursor: &Cursor) {
        let pool = &mut self.pools[cursor.pool];
        let slot = pool.slot(cursor.slot);
        // SAFETY: peek resolved this slot as live; the caller moved the
        // object out. The relocated top lands under the cursor and is
        // revisited, so the hint can be dropped.
        let _ = unsafe { pool.deallocate(slot) };
    }
}

impl<T> Default for Cascade<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Cascade<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cascade")
            .field("pools", &self.pools.len())
            .field("len", &self.len())
            .field("pool_capacity", &self.pool_cap)
            .finish()
    }
}

/// Iterator over every live object of a [`Cascade`], in pool order.
pub struct Iter<'a, T> {
    pools: slice::Iter<'a, StackPool<T>>,
    cur: slice::Iter<'a, T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        loop {
            if let Some(item) = self.cur.next() {
                return Some(item);
            }
            self.cur = self.pools.next()?.iter();
        }
    }
}

impl<'a, T> IntoIterator for &'a Cascade<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Sweep position over a [`Cascade`], used for draining passes that remove
/// some of the slots they visit.
///
/// Unlike a borrowing iterator, the cursor holds no reference: the caller
/// alternates [`Cascade::peek`], reads or moves the object out, and either
/// [`advance`](Cursor::advance)s past it or calls
/// [`Cascade::remove_current`] to free it in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cursor {
    pool: usize,
    slot: usize,
}

impl Cursor {
    /// A cursor positioned at the first slot of the first pool.
    pub fn new() -> Self {
        Self { pool: 0, slot: 0 }
    }

    /// Moves past the current slot.
    #[inline]
    pub fn advance(&mut self) {
        self.slot += 1;
    }
}
