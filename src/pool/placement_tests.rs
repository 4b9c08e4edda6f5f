//! Tests for placement: the aligned free-run scan and block selection.

use std::sync::Arc;

use proptest::prelude::*;

use super::*;
use crate::device::{HostDevice, MemoryPropertyFlags};
use crate::pool::{Allocation, MemoryPool};

fn host_visible() -> MemoryPropertyFlags {
    MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT
}

/// Smallest aligned start with `required` free units, by exhaustive search.
fn first_fit_oracle(free: &[bool], unit: u64, required: usize, alignment: u64) -> Option<usize> {
    (0..free.len()).find(|&i| {
        (i as u64 * unit) % alignment == 0
            && i + required <= free.len()
            && free[i..i + required].iter().all(|f| *f)
    })
}

#[test]
fn test_align_up() {
    assert_eq!(align_up(10, 1), Some(10));
    assert_eq!(align_up(10, 0), Some(10));
    assert_eq!(align_up(10, 16), Some(16));
    assert_eq!(align_up(64, 64), Some(64));
    assert_eq!(align_up(u64::MAX, 2), None);
}

#[test]
fn test_empty_list_fits_at_zero() {
    let free = vec![true; 8];
    assert_eq!(find_free_run(&free, 64, 3, 1), Some(0));
    assert_eq!(find_free_run(&free, 64, 8, 64), Some(0));
    assert_eq!(find_free_run(&free, 64, 9, 1), None);
}

#[test]
fn test_skip_ahead_to_aligned_unit() {
    // Unit 48, alignment 64: only units 0, 4, 8, ... start on a 64-byte boundary.
    let mut free = vec![true; 8];
    free[0] = false;
    assert_eq!(find_free_run(&free, 48, 1, 64), Some(4));
    assert_eq!(find_free_run(&free, 48, 4, 64), Some(4));
    assert_eq!(find_free_run(&free, 48, 5, 64), None);
}

#[test]
fn test_alignment_larger_than_unit() {
    let mut free = vec![true; 16];
    free[0] = false;
    // 256-byte alignment with 64-byte units lands on unit 4.
    assert_eq!(find_free_run(&free, 64, 2, 256), Some(4));
}

#[test]
fn test_resume_after_short_run() {
    let free = [true, true, false, true, true, true];
    assert_eq!(find_free_run(&free, 1, 3, 1), Some(3));
    assert_eq!(find_free_run(&free, 1, 2, 1), Some(0));
    assert_eq!(find_free_run(&free, 1, 4, 1), None);
}

#[test]
fn test_fully_used_list() {
    let free = vec![false; 32];
    assert_eq!(find_free_run(&free, 64, 1, 1), None);
}

proptest! {
    #[test]
    fn test_scan_matches_exhaustive_first_fit(
        free in prop::collection::vec(any::<bool>(), 0..64),
        unit in prop::sample::select(vec![16u64, 48, 64, 100, 256]),
        required in 1usize..8,
        alignment in prop::sample::select(vec![1u64, 16, 64, 128, 256, 4096]),
    ) {
        prop_assert_eq!(
            find_free_run(&free, unit, required, alignment),
            first_fit_oracle(&free, unit, required, alignment)
        );
    }

    #[test]
    fn test_live_allocations_are_aligned_and_disjoint(
        ops in prop::collection::vec(
            (any::<bool>(), 1u64..700, prop::sample::select(vec![1u64, 16, 64, 256])),
            1..60,
        ),
    ) {
        let pool = MemoryPool::new(Arc::new(HostDevice::default()));
        pool.configure(PoolCategory::Uniform, 4096, 48, host_visible());
        let mut live: Vec<(Allocation, u64)> = Vec::new();

        for (allocate, size, alignment) in ops {
            if !allocate && !live.is_empty() {
                let (allocation, _) = live.remove(0);
                pool.deallocate(allocation);
                continue;
            }
            let allocation = pool.allocate(PoolCategory::Uniform, size, alignment).unwrap();
            prop_assert_eq!(allocation.offset() % alignment, 0);
            prop_assert!(allocation.size() >= size);
            prop_assert_eq!(allocation.size() % 48, 0);

            let (start, end) = (allocation.offset(), allocation.offset() + allocation.size());
            for (other, _) in &live {
                if other.memory() == allocation.memory() {
                    let (o_start, o_end) = (other.offset(), other.offset() + other.size());
                    prop_assert!(end <= o_start || o_end <= start);
                }
            }
            live.push((allocation, size));
        }

        for (allocation, _) in live {
            pool.deallocate(allocation);
        }
        prop_assert_eq!(pool.memory_usage(PoolCategory::Uniform).used, 0);
    }
}

#[test]
fn test_scan_blocks_skips_dedicated_blocks() {
    let device = HostDevice::default();
    let mut state = PoolState::default();
    state.configs.configure(PoolCategory::Staging, 4096, 64, host_visible());

    let config = *state.configs.get(PoolCategory::Staging).unwrap();
    let dedicated = crate::pool::block::create_block_with_type(
        &device,
        &config,
        4096,
        1,
        crate::device::MemoryAllocateFlags::empty(),
    )
    .unwrap();
    // A fresh dedicated block has a fully free list but must never be chosen.
    state.blocks[PoolCategory::Staging.index()].push(dedicated);
    assert_eq!(
        scan_blocks(&state.blocks[PoolCategory::Staging.index()], 64, 1),
        None
    );

    let placement = state
        .find_suitable_block(&device, PoolCategory::Staging, 64, 1)
        .unwrap();
    assert_eq!(
        placement,
        Placement {
            block_index: 1,
            start_unit: 0
        }
    );
}

#[test]
fn test_find_suitable_block_requires_config() {
    let device = HostDevice::default();
    let mut state = PoolState::default();
    let err = state
        .find_suitable_block(&device, PoolCategory::Vertex, 64, 1)
        .unwrap_err();
    assert!(matches!(err, PoolError::NotConfigured(PoolCategory::Vertex)));
    assert!(state.blocks[PoolCategory::Vertex.index()].is_empty());
}
