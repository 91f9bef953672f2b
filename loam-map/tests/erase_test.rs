//! Removal through every chain shape: lone entries, head nodes, interior
//! nodes, and the tail-entry case that demotes the surviving node.

mod common;

use common::{zero_map, ZeroMap};
use loam_map::LoamMap;

/// Builds a single chain over keys `1..=n`, each mapped to itself.
fn chain(n: u64) -> ZeroMap {
    let mut map = zero_map(10);
    for k in 1..=n {
        *map.get_or_insert(k) = k;
    }
    map
}

#[test]
fn remove_from_an_empty_map() {
    let mut map = zero_map(10);
    assert_eq!(map.remove(&3), None);
    assert_eq!(map.len(), 0);
}

#[test]
fn remove_the_lone_entry() {
    let mut map = chain(1);
    assert_eq!(map.remove(&1), Some(1));
    assert_eq!(map.len(), 0);
    assert_eq!(map.count(&1), 0);
    assert_eq!(map.entry_slots(), 0);
}

#[test]
fn remove_the_newest_of_two() {
    let mut map = chain(2);
    assert_eq!(map.remove(&2), Some(2));
    assert_eq!(map.get(&1), Some(&1));
    assert_eq!(map.count(&2), 0);
    assert_eq!(map.len(), 1);
}

#[test]
fn remove_the_newest_of_three() {
    let mut map = chain(3);
    assert_eq!(map.remove(&3), Some(3));
    assert_eq!(map.get(&1), Some(&1));
    assert_eq!(map.get(&2), Some(&2));
    assert_eq!(map.count(&3), 0);
}

#[test]
fn remove_the_tail_demotes_the_survivor() {
    let mut map = chain(2);
    assert_eq!(map.remove(&1), Some(1));
    assert_eq!(map.len(), 1);
    assert_eq!(map.get(&2), Some(&2));
    // The surviving record moved from the node pool to the entry pool.
    assert_eq!(map.entry_slots(), 1);
    assert_eq!(map.node_slots(), 0);
}

#[test]
fn remove_the_tail_of_three() {
    let mut map = chain(3);
    assert_eq!(map.remove(&1), Some(1));
    assert_eq!(map.get(&2), Some(&2));
    assert_eq!(map.get(&3), Some(&3));
    assert_eq!(map.count(&1), 0);
    // Length two keeps one node and one (demoted) entry.
    assert_eq!(map.entry_slots(), 1);
    assert_eq!(map.node_slots(), 1);
}

#[test]
fn remove_the_middle_of_three() {
    let mut map = chain(3);
    assert_eq!(map.remove(&2), Some(2));
    assert_eq!(map.get(&1), Some(&1));
    assert_eq!(map.get(&3), Some(&3));
    assert_eq!(map.count(&2), 0);
}

#[test]
fn remove_an_interior_node_of_four() {
    let mut map = chain(4);
    assert_eq!(map.remove(&3), Some(3));
    for k in [1, 2, 4] {
        assert_eq!(map.get(&k), Some(&k));
    }
    assert_eq!(map.count(&3), 0);
}

#[test]
fn remove_the_middle_of_five() {
    let mut map = chain(5);
    assert_eq!(map.remove(&3), Some(3));
    for k in [1, 2, 4, 5] {
        assert_eq!(map.get(&k), Some(&k));
    }
    assert_eq!(map.len(), 4);
}

#[test]
fn removed_keys_reinsert_with_default_values() {
    let mut map = chain(3);
    map.remove(&2);
    assert_eq!(*map.get_or_insert(2), 0);
    assert_eq!(map.len(), 3);
}

#[test]
fn clear_keeps_the_bucket_table() {
    let mut map = chain(5);
    assert_eq!(map.len(), 5);
    let buckets = map.bucket_count();
    map.clear();
    assert_eq!(map.len(), 0);
    assert_eq!(map.bucket_count(), buckets);
    assert_eq!(map.entry_slots(), 0);
    assert_eq!(map.node_slots(), 0);
    // The cleared map accepts inserts again.
    assert_eq!(*map.get_or_insert(3), 0);
}

#[test]
fn clear_with_a_real_hasher() {
    let mut map: LoamMap<u64, u64> = LoamMap::with_buckets(6);
    for k in 1..6 {
        *map.get_or_insert(k) = k;
    }
    assert_eq!(map.len(), 5);
    map.clear();
    assert_eq!(map.len(), 0);
    assert_eq!(*map.get_or_insert(3), 0);
}

#[test]
fn clear_matches_erasing_every_key() {
    let mut cleared = chain(6);
    cleared.clear();

    let mut erased = chain(6);
    for k in 1..=6 {
        assert_eq!(erased.remove(&k), Some(k));
    }

    for k in 1..=6 {
        assert_eq!(cleared.count(&k), erased.count(&k));
    }
    assert_eq!(cleared.len(), erased.len());
    assert_eq!(erased.entry_slots(), 0);
    assert_eq!(erased.node_slots(), 0);
}

#[test]
fn insert_then_remove_a_hundred_keys_drains_both_pools() {
    let mut map: LoamMap<u64, u64> = LoamMap::new();
    for k in 0..100 {
        *map.get_or_insert(k) = k;
    }
    for k in 0..100 {
        assert_eq!(map.remove(&k), Some(k));
    }
    assert_eq!(map.len(), 0);
    assert_eq!(map.entry_slots(), 0);
    assert_eq!(map.node_slots(), 0);
}

#[test]
fn removal_order_does_not_matter() {
    // Front-to-back, back-to-front, and inside-out over one long chain.
    for order in [
        (1..=8).collect::<Vec<u64>>(),
        (1..=8).rev().collect(),
        vec![4, 5, 3, 6, 2, 7, 1, 8],
    ] {
        let mut map = chain(8);
        for (i, k) in order.iter().enumerate() {
            assert_eq!(map.remove(k), Some(*k), "order {order:?}, step {i}");
            for rest in order.iter().skip(i + 1) {
                assert_eq!(map.get(rest), Some(rest), "order {order:?}, step {i}");
            }
        }
        assert!(map.is_empty());
    }
}
