//! Shared test helpers.
#![allow(dead_code)]

use std::hash::{BuildHasher, Hasher};

use loam_map::LoamMap;

/// Build-hasher that sends every key to bucket zero, forcing a single
/// chain. Mirrors the degenerate hash used to exercise chain handling.
#[derive(Clone, Copy, Default)]
pub struct ZeroState;

impl BuildHasher for ZeroState {
    type Hasher = ZeroHasher;

    fn build_hasher(&self) -> ZeroHasher {
        ZeroHasher
    }
}

pub struct ZeroHasher;

impl Hasher for ZeroHasher {
    fn finish(&self) -> u64 {
        0
    }

    fn write(&mut self, _bytes: &[u8]) {}
}

pub type ZeroMap = LoamMap<u64, u64, ZeroState>;

/// A map with `buckets` buckets where every key collides into bucket 0.
pub fn zero_map(buckets: usize) -> ZeroMap {
    LoamMap::with_buckets_and_hasher(buckets, ZeroState)
}
