//! The hash map coordinator.
//!
//! `LoamMap` owns the bucket table and the two pools and keeps them
//! consistent: every live record sits in exactly one pool slot, every bucket
//! references only live slots of the right kind, and whenever a pool
//! compacts a slot away the affected bucket is repaired before the operation
//! returns.

use alloc::boxed::Box;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use core::ptr::{self, NonNull};
use core::slice;

use foldhash::fast::FixedState;
use loam::{Cascade, Cursor};

use crate::bucket::{Bucket, Chain, Entry, Node};
use crate::error::MapError;

#[cold]
fn capacity_overflow() -> ! {
    panic!("pool backing storage exhausted");
}

/// A hash map whose records live in two stack-packed pools instead of
/// individual heap allocations.
///
/// Buckets resolve collisions by separate chaining, but the chain storage is
/// unusual: a bucket with one member references a bare record in the *entry
/// pool*, and only from the second member on do records occupy linked cells
/// in the *node pool*. The bucket head encodes which case applies in its two
/// low pointer bits, so no extra discriminant is stored anywhere.
///
/// Because the pools compact on every free, records have no stable address:
/// any `remove`, `clear` or rehash may relocate unrelated records. The map
/// repairs its own bucket pointers when that happens, and the borrow checker
/// keeps callers from holding references across mutations.
///
/// The default hasher is [`foldhash::fast::FixedState`]; any
/// [`BuildHasher`] can be supplied instead.
///
/// # Example
///
/// ```rust
/// use loam_map::LoamMap;
///
/// let mut map: LoamMap<u64, u64> = LoamMap::new();
/// *map.get_or_insert(1) = 10;
/// *map.get_or_insert(2) = 20;
/// assert_eq!(map.get(&1), Some(&10));
/// assert_eq!(map.remove(&2), Some(20));
/// assert_eq!(map.len(), 1);
/// ```
pub struct LoamMap<K, V, S = FixedState> {
    buckets: Box<[Bucket<K, V>]>,
    entries: Cascade<Entry<K, V>>,
    nodes: Cascade<Node<K, V>>,
    len: usize,
    max_load: f32,
    hasher: S,
}

fn fresh_table<K, V>(n: usize) -> Box<[Bucket<K, V>]> {
    (0..n).map(|_| Bucket::new()).collect()
}

impl<K, V> LoamMap<K, V, FixedState>
where
    K: Hash + Eq,
{
    /// Creates an empty map with a single bucket and the default hasher.
    pub fn new() -> Self {
        Self::with_hasher(FixedState::default())
    }

    /// Creates an empty map with `n` buckets.
    ///
    /// # Panics
    /// Panics if `n` is zero.
    pub fn with_buckets(n: usize) -> Self {
        Self::with_buckets_and_hasher(n, FixedState::default())
    }
}

impl<K, V, S> LoamMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates an empty map with a single bucket and the given hasher.
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_buckets_and_hasher(1, hasher)
    }

    /// Creates an empty map with `n` buckets and the given hasher.
    ///
    /// # Panics
    /// Panics if `n` is zero.
    pub fn with_buckets_and_hasher(n: usize, hasher: S) -> Self {
        assert!(n >= 1, "a map needs at least one bucket");
        Self {
            buckets: fresh_table(n),
            entries: Cascade::new(),
            nodes: Cascade::new(),
            len: 0,
            max_load: 1.0,
            hasher,
        }
    }

    /// Number of live mappings.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the map holds no mappings.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current length of the bucket table. Never zero.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Live slots in the entry pool: lone-bucket residents and chain
    /// terminators.
    pub fn entry_slots(&self) -> usize {
        self.entries.len()
    }

    /// Live slots in the node pool: all other chain positions.
    pub fn node_slots(&self) -> usize {
        self.nodes.len()
    }

    /// Ratio of live mappings to buckets.
    pub fn load_factor(&self) -> f32 {
        self.len as f32 / self.buckets.len() as f32
    }

    /// The threshold ratio above which an insert grows the table.
    pub fn max_load_factor(&self) -> f32 {
        self.max_load
    }

    /// Sets the rehash threshold.
    ///
    /// # Panics
    /// Panics unless `f > 0`; a non-positive threshold would demand a
    /// rehash on every insert forever.
    pub fn set_max_load_factor(&mut self, f: f32) {
        assert!(f > 0.0, "max load factor must be positive");
        self.max_load = f;
    }

    /// The map's build-hasher.
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    #[inline]
    fn bucket_index<Q>(&self, key: &Q) -> usize
    where
        Q: Hash + ?Sized,
    {
        (self.hasher.hash_one(key) as usize) % self.buckets.len()
    }

    /// Returns a reference to the value mapped to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let i = self.bucket_index(key);
        let entry = self.buckets[i].search(key)?;
        // SAFETY: the slot is live and the shared borrow of the map keeps
        // it in place.
        Some(unsafe { &(*entry.as_ptr()).val })
    }

    /// Returns a mutable reference to the value mapped to `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let i = self.bucket_index(key);
        let entry = self.buckets[i].search(key)?;
        // SAFETY: the slot is live and the exclusive borrow of the map
        // keeps it in place.
        Some(unsafe { &mut (*entry.as_ptr()).val })
    }

    /// Like [`get`](LoamMap::get), but reports the miss as
    /// [`MapError::NotFound`].
    pub fn at<Q>(&self, key: &Q) -> Result<&V, MapError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).ok_or(MapError::NotFound)
    }

    /// Returns `true` if `key` is in the map.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Number of mappings for `key`: 0 or 1.
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.contains_key(key) as usize
    }

    /// Returns the value mapped to `key`, inserting a default-constructed
    /// value first if the key is absent.
    ///
    /// # Panics
    /// Panics if a pool cannot obtain backing storage; see
    /// [`try_get_or_insert`](LoamMap::try_get_or_insert) for the reporting
    /// variant.
    pub fn get_or_insert(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        match self.try_get_or_insert(key) {
            Ok(val) => val,
            Err(_) => capacity_overflow(),
        }
    }

    /// Fallible [`get_or_insert`](LoamMap::get_or_insert): reports
    /// [`MapError::CapacityExhausted`] instead of panicking.
    ///
    /// Allocation happens before any bucket is touched, so a failed insert
    /// leaves the map exactly as it was (the key is dropped).
    pub fn try_get_or_insert(&mut self, key: K) -> Result<&mut V, MapError>
    where
        V: Default,
    {
        let mut i = self.bucket_index(&key);
        if let Some(entry) = self.buckets[i].search(&key) {
            // SAFETY: live slot, kept in place by the exclusive borrow.
            return Ok(unsafe { &mut (*entry.as_ptr()).val });
        }

        if self.load_factor() >= self.max_load {
            self.try_rehash(self.buckets.len() * 2 + 1)?;
            i = self.bucket_index(&key);
        }

        let slot = if self.buckets[i].is_empty() {
            let entry = self.entries.try_alloc(Entry::new(key, V::default()))?;
            // SAFETY: the bucket is empty and `entry` is a fresh live slot.
            unsafe { self.buckets[i].push_entry(entry) };
            entry
        } else {
            let node = self.nodes.try_alloc(Node::new(Entry::new(key, V::default())))?;
            // SAFETY: the bucket is non-empty and `node` is a fresh live
            // slot, not yet linked anywhere.
            unsafe { self.buckets[i].push_node(node) };
            node.cast::<Entry<K, V>>()
        };
        self.len += 1;
        // SAFETY: freshly installed live slot.
        Ok(unsafe { &mut (*slot.as_ptr()).val })
    }

    /// Removes `key` from the map, returning its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let i = self.bucket_index(key);
        let target = self.buckets[i].search(key)?;
        // SAFETY: `target` was just found as a chain position of bucket i.
        let removal = unsafe { self.buckets[i].remove(target) };

        let value;
        if removal.entry_slot {
            // SAFETY: the bucket no longer references `target`; moving the
            // record out leaves the slot ready for deallocation. The key is
            // dropped here, the value handed back.
            let Entry { key: _, val } = unsafe { ptr::read(target.as_ptr()) };
            value = val;
            // SAFETY: moved out above, unreferenced.
            unsafe { self.free_entry_slot(target) };

            if let Some(node) = removal.demote {
                // The surviving tail still sits in a node slot and must
                // migrate to the entry pool. The entry slot freed just
                // above guarantees this allocation finds room.
                // SAFETY: the bucket references `node` only through the
                // transient entry-tagged head/next that patch_entry
                // rewrites below; its payload is moved, not copied.
                let payload = unsafe { ptr::read(ptr::addr_of!((*node.as_ptr()).entry)) };
                let Ok(fresh) = self.entries.try_alloc(payload) else {
                    unreachable!("an entry slot was freed above");
                };
                // SAFETY: patch the one reference to the stranded node,
                // then release its slot (payload already moved out).
                unsafe {
                    self.buckets[i].patch_entry(node.cast::<Entry<K, V>>().as_ptr(), fresh);
                    self.free_node_slot(node);
                }
            }
        } else {
            let node = target.cast::<Node<K, V>>();
            // SAFETY: spliced out of the chain; record moved out, key
            // dropped, value handed back.
            let Entry { key: _, val } = unsafe { ptr::read(ptr::addr_of!((*node.as_ptr()).entry)) };
            value = val;
            // SAFETY: moved out above, unreferenced.
            unsafe { self.free_node_slot(node) };
        }

        self.len -= 1;
        Some(value)
    }

    /// Removes every mapping. The bucket table keeps its current length,
    /// and each pool shrinks back to one slab.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.nodes.clear();
        for bucket in self.buckets.iter_mut() {
            bucket.reset();
        }
        self.len = 0;
    }

    /// Grows the bucket table to `new_buckets` and redistributes every
    /// record. Requests that do not grow the table are no-ops.
    ///
    /// # Panics
    /// Panics if a pool cannot obtain backing storage; see
    /// [`try_rehash`](LoamMap::try_rehash).
    pub fn rehash(&mut self, new_buckets: usize) {
        if self.try_rehash(new_buckets).is_err() {
            capacity_overflow();
        }
    }

    /// Fallible [`rehash`](LoamMap::rehash).
    ///
    /// Worst-case transfer capacity is reserved in both pools before any
    /// bucket is touched: pass 1 can move at most every entry into the node
    /// pool, pass 2 at most every node into the entry pool. A reservation
    /// failure therefore reports [`MapError::CapacityExhausted`] with the
    /// old table fully intact, and the passes themselves never allocate
    /// from the system.
    pub fn try_rehash(&mut self, new_buckets: usize) -> Result<(), MapError> {
        if new_buckets <= self.buckets.len() {
            return Ok(());
        }
        self.nodes.reserve(self.entries.len())?;
        self.entries.reserve(self.nodes.len())?;

        let mut table = fresh_table(new_buckets);
        // Ordering is load-bearing: entries first. Entries that collide
        // migrate into the node pool and are deliberately left unlinked so
        // the node sweep picks them up.
        self.reassign_entries(&mut table);
        self.reassign_nodes(&mut table);
        self.buckets = table;
        Ok(())
    }

    /// Pass 1 of rehash: each entry either becomes the lone entry of its
    /// new bucket or, on collision, moves into the node pool.
    fn reassign_entries(&mut self, table: &mut [Bucket<K, V>]) {
        let mut cursor = Cursor::new();
        while let Some(p) = self.entries.peek(&mut cursor) {
            let i = {
                // SAFETY: `peek` yields live slots only.
                let key = unsafe { &(*p.as_ptr()).key };
                (self.hasher.hash_one(key) as usize) % table.len()
            };
            if table[i].is_empty() {
                // SAFETY: empty target bucket; the slot stays where it is.
                unsafe { table[i].push_entry(p) };
                cursor.advance();
            } else {
                // Collision: the record must become a node. Not linked into
                // the table here; pass 2 sweeps the node pool. Freeing the
                // slot refills it from the pool top, and the unadvanced
                // cursor revisits the refill.
                // SAFETY: record moved out before the slot is freed.
                unsafe {
                    let record = ptr::read(p.as_ptr());
                    if self.nodes.try_alloc(Node::new(record)).is_err() {
                        unreachable!("node capacity is reserved before rehash");
                    }
                    self.entries.remove_current(&cursor);
                }
            }
        }
    }

    /// Pass 2 of rehash: each node is linked into its new bucket, except
    /// that a node bound for a still-empty bucket demotes into the entry
    /// pool first, because buckets of length one hold entries.
    fn reassign_nodes(&mut self, table: &mut [Bucket<K, V>]) {
        let mut cursor = Cursor::new();
        while let Some(p) = self.nodes.peek(&mut cursor) {
            let i = {
                // SAFETY: `peek` yields live slots only.
                let key = unsafe { &(*p.as_ptr()).entry.key };
                (self.hasher.hash_one(key) as usize) % table.len()
            };
            if table[i].is_empty() {
                // SAFETY: payload moved out before the slot is freed; the
                // unadvanced cursor revisits the refilled slot.
                unsafe {
                    let record = ptr::read(ptr::addr_of!((*p.as_ptr()).entry));
                    let Ok(fresh) = self.entries.try_alloc(record) else {
                        unreachable!("entry capacity is reserved before rehash");
                    };
                    self.nodes.remove_current(&cursor);
                    table[i].push_entry(fresh);
                }
            } else {
                // SAFETY: non-empty target bucket; the node keeps its slot
                // and its next field is overwritten by the push.
                unsafe { table[i].push_node(p) };
                cursor.advance();
            }
        }
    }

    /// Releases an entry slot whose record was moved out, then repairs the
    /// bucket of whichever record the pool compacted into the hole.
    ///
    /// # Safety
    /// `p` must be a live entry-pool slot that no bucket references and
    /// whose record has been moved out.
    unsafe fn free_entry_slot(&mut self, p: NonNull<Entry<K, V>>) {
        // SAFETY: forwarded precondition.
        let Some(moved) = (unsafe { self.entries.deallocate(p) }) else {
            return;
        };
        // The record now at `p` is live after the move, so its key tells
        // us which bucket holds the stale back-reference.
        let j = {
            // SAFETY: the hole was refilled by the relocated record.
            let key = unsafe { &(*p.as_ptr()).key };
            self.bucket_index(key)
        };
        // SAFETY: bucket j carries the unique entry-tagged reference to
        // the relocated record's old address.
        unsafe { self.buckets[j].patch_entry(moved.source().as_ptr(), p) };
    }

    /// Node-pool counterpart of
    /// [`free_entry_slot`](LoamMap::free_entry_slot).
    ///
    /// # Safety
    /// `p` must be a live node-pool slot that no bucket references and
    /// whose payload has been moved out.
    unsafe fn free_node_slot(&mut self, p: NonNull<Node<K, V>>) {
        // SAFETY: forwarded precondition.
        let Some(moved) = (unsafe { self.nodes.deallocate(p) }) else {
            return;
        };
        let j = {
            // SAFETY: the hole was refilled by the relocated node.
            let key = unsafe { &(*p.as_ptr()).entry.key };
            self.bucket_index(key)
        };
        // SAFETY: bucket j references the relocated node's old address as
        // its head or through some node's next.
        unsafe { self.buckets[j].patch_node(moved.source().as_ptr(), p) };
    }

    /// Iterates all mappings. The order is unspecified but deterministic
    /// for a given operation history.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: self.buckets.iter(),
            chain: Chain::empty(),
            remaining: self.len,
        }
    }

    /// Iterates all keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }
}

impl<K, V> Default for LoamMap<K, V, FixedState>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> fmt::Debug for LoamMap<K, V, S>
where
    K: Hash + Eq + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// SAFETY: the map exclusively owns every slot its buckets reference.
unsafe impl<K: Send, V: Send, S: Send> Send for LoamMap<K, V, S> {}

// SAFETY: shared access never mutates through the tagged pointers.
unsafe impl<K: Sync, V: Sync, S: Sync> Sync for LoamMap<K, V, S> {}

/// Iterator over a map's `(&K, &V)` pairs.
///
/// Created by [`LoamMap::iter`]. Any mutation of the map invalidates it,
/// which the borrow checker enforces.
pub struct Iter<'a, K, V> {
    buckets: slice::Iter<'a, Bucket<K, V>>,
    chain: Chain<K, V>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.chain.next() {
                self.remaining -= 1;
                // SAFETY: the shared borrow of the map keeps the slot live
                // and in place for 'a.
                let entry = unsafe { &*entry.as_ptr() };
                return Some((&entry.key, &entry.val));
            }
            self.chain = self.buckets.next()?.chain();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<'a, K, V, S> IntoIterator for &'a LoamMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a map's keys.
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lone_entry_then_chain_then_back() {
        let mut map: LoamMap<u64, u64> = LoamMap::with_buckets(1);
        *map.get_or_insert(1) = 10;
        assert_eq!(map.entry_slots(), 1);
        assert_eq!(map.node_slots(), 0);

        // Second member of the same bucket moves storage to the node pool.
        map.set_max_load_factor(16.0);
        *map.get_or_insert(2) = 20;
        assert_eq!(map.node_slots(), 1);

        // Removing the tail entry strands the node, which demotes back
        // into the entry pool.
        assert_eq!(map.remove(&1), Some(10));
        assert_eq!(map.entry_slots(), 1);
        assert_eq!(map.node_slots(), 0);
        assert_eq!(map.get(&2), Some(&20));
    }

    #[test]
    fn iteration_covers_every_mapping_once() {
        let mut map: LoamMap<u64, u64> = LoamMap::new();
        for k in 0..100 {
            *map.get_or_insert(k) = k * 2;
        }
        assert_eq!(map.iter().len(), 100);
        let mut seen: alloc::vec::Vec<u64> = map.keys().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..100).collect::<alloc::vec::Vec<u64>>());
    }
}
