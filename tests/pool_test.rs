//! Integration tests for the buddy pool
//!
//! Exercises the pool through its public surface only, with adversarial
//! allocation/free patterns that stress splitting, coalescing, and the
//! used-block validation in `free`.

#![no_std]

extern crate alloc;
extern crate corekit;

use alloc::vec::Vec;
use corekit::{Pool, PoolError, HEADER_BYTES};

#[test]
fn test_roundtrip_after_full_release() {
    // 1024-byte arena, 32-byte minimum blocks.
    let mut pool = Pool::new(10, 5).unwrap();

    let buffer = pool.alloc(1000).expect("1000 bytes must fit");
    pool.free(buffer);

    // A balanced sequence leaves no permanent fragmentation: the same
    // request succeeds again.
    let buffer = pool.alloc(1000).expect("pool must coalesce back");
    pool.free(buffer);
}

#[test]
fn test_no_fragmentation_from_interleaved_frees() {
    let mut pool = Pool::new(12, 5).unwrap();

    let mut offs = Vec::new();
    for _ in 0..16 {
        offs.push(pool.alloc(100).unwrap());
    }
    // Free in an order that exercises both left- and right-buddy merges.
    for &off in offs.iter().step_by(2) {
        pool.free(off);
    }
    for &off in offs.iter().skip(1).step_by(2) {
        pool.free(off);
    }

    // Arena capacity minus header must be allocatable again.
    let cap = pool.capacity();
    let big = pool.alloc(cap - HEADER_BYTES).expect("full arena block");
    pool.free(big);
}

#[test]
fn test_adversarial_pattern_conserves_bytes() {
    let mut pool = Pool::new(11, 5).unwrap();
    let capacity = pool.capacity();

    let mut live = Vec::new();
    let sizes = [1usize, 17, 40, 100, 250, 40, 512, 9, 77, 130];
    for (i, &size) in sizes.iter().enumerate() {
        if let Some(off) = pool.alloc(size) {
            live.push(off);
        }
        // Drop every third allocation early.
        if i % 3 == 2 {
            if let Some(off) = live.pop() {
                pool.free(off);
            }
        }
        let (free_bytes, used_bytes) = pool.byte_counts();
        assert_eq!(free_bytes + used_bytes, capacity);
    }
    for off in live {
        pool.free(off);
    }

    let (free_bytes, used_bytes) = pool.byte_counts();
    assert_eq!(free_bytes, capacity);
    assert_eq!(used_bytes, 0);
    let (free_nodes, used_nodes) = pool.node_counts();
    assert_eq!((free_nodes, used_nodes), (1, 0));
}

#[test]
fn test_distinct_allocations_do_not_overlap() {
    let mut pool = Pool::new(10, 5).unwrap();

    let a = pool.alloc(50).unwrap();
    let b = pool.alloc(50).unwrap();
    assert_ne!(a, b);

    pool.data_mut(a).unwrap().fill(0xAA);
    pool.data_mut(b).unwrap().fill(0xBB);
    assert!(pool.data(a).unwrap().iter().all(|&byte| byte == 0xAA));
    assert!(pool.data(b).unwrap().iter().all(|&byte| byte == 0xBB));

    pool.free(a);
    pool.free(b);
}

#[test]
fn test_error_taxonomy() {
    // max_order beyond the word size is a range error, not a value error.
    assert_eq!(
        Pool::new(usize::BITS as usize, 5).unwrap_err(),
        PoolError::OutOfRange
    );
    // Ordering violation and a header that cannot fit are value errors.
    assert_eq!(Pool::new(8, 9).unwrap_err(), PoolError::BadValue);
    assert_eq!(Pool::new(8, 0).unwrap_err(), PoolError::BadValue);
}

#[test]
fn test_exhaustion_is_routine() {
    let mut pool = Pool::new(10, 5).unwrap();
    let mut live = Vec::new();
    // Grab minimum-size blocks until the pool runs dry.
    while let Some(off) = pool.alloc(1) {
        live.push(off);
    }
    assert_eq!(live.len(), 32); // 1024 / 32
    assert!(pool.alloc(1).is_none());

    for off in live {
        pool.free(off);
    }
    assert!(pool.alloc(1000).is_some());
}

#[cfg(feature = "tracking")]
#[test]
fn test_split_merge_counters_balance() {
    let mut pool = Pool::new(12, 5).unwrap();

    let mut live = Vec::new();
    for size in [10, 600, 33, 90, 1024, 7] {
        live.push(pool.alloc(size).unwrap());
    }
    // The net split count equals the number of live split boundaries,
    // which is one less than the number of block records.
    let (free_nodes, used_nodes) = pool.node_counts();
    assert_eq!(pool.splits() - pool.merges(), free_nodes + used_nodes - 1);

    for off in live {
        pool.free(off);
    }
    assert_eq!(pool.splits(), pool.merges());
}
