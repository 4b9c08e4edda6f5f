// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Allocation placement: first-fit across blocks in creation order,
//! first-fit within a block left to right, with alignment-aware skip-ahead.
//!
//! The allocation unit is not guaranteed to be a multiple of every resource
//! alignment, so the scan hunts for a unit boundary whose byte offset is
//! also aligned instead of assuming every unit index is.

use super::block::{create_block, MemoryBlock};
use super::config::PoolCategory;
use super::manager::PoolState;
use super::telemetry;
use super::types::BlockKind;
use crate::device::{MemoryAllocateFlags, MemoryDevice};
use crate::error::PoolError;

/// Round `value` up to a multiple of `alignment` (treated as 1 when zero).
pub fn align_up(value: u64, alignment: u64) -> Option<u64> {
    value.checked_next_multiple_of(alignment.max(1))
}

/// Find the first unit index `i` such that `i * unit` is a multiple of
/// `alignment` and `required_units` units starting at `i` are all free.
///
/// After a run starting at an aligned `i` breaks at `j`, scanning resumes at
/// `j`: every start between `i` and `j` lies inside the same free run and
/// would break at `j` too, so no fitting placement is skipped.
pub fn find_free_run(
    free_list: &[bool],
    unit: u64,
    required_units: usize,
    alignment: u64,
) -> Option<usize> {
    let alignment = alignment.max(1);
    let total = free_list.len();
    let mut i = 0;

    while i < total {
        let start = i as u64 * unit;
        let remainder = start % alignment;
        if remainder != 0 {
            let advance = (alignment - remainder).div_ceil(unit) as usize;
            i += advance.max(1);
            continue;
        }

        let mut j = i;
        while j < total && free_list[j] && j - i < required_units {
            j += 1;
        }
        if j - i >= required_units {
            return Some(i);
        }

        i = if j > i { j } else { i + 1 };
    }
    None
}

/// Where a request landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Placement {
    pub(crate) block_index: usize,
    pub(crate) start_unit: usize,
}

/// Scan pooled blocks for an aligned free run of `aligned_size` bytes.
pub(crate) fn scan_blocks(
    blocks: &[MemoryBlock],
    aligned_size: u64,
    alignment: u64,
) -> Option<Placement> {
    blocks
        .iter()
        .enumerate()
        .filter(|(_, block)| block.kind == BlockKind::Pooled)
        .find_map(|(block_index, block)| {
            let required = block.units_for(aligned_size);
            find_free_run(&block.free_list, block.allocation_unit, required, alignment).map(
                |start_unit| Placement {
                    block_index,
                    start_unit,
                },
            )
        })
}

impl PoolState {
    /// Find room for a request in `category`, growing the category by one
    /// block when no existing block fits.
    pub(crate) fn find_suitable_block<D: MemoryDevice + ?Sized>(
        &mut self,
        device: &D,
        category: PoolCategory,
        size: u64,
        alignment: u64,
    ) -> Result<Placement, PoolError> {
        let config = *self.configs.get(category)?;
        let aligned_size = align_up(size, alignment)
            .ok_or_else(|| PoolError::InvalidRequest(format!("size {} overflows", size)))?;

        let blocks = &mut self.blocks[category.index()];
        if let Some(placement) = scan_blocks(blocks, aligned_size, alignment) {
            return Ok(placement);
        }

        let block = create_block(device, &config, aligned_size, MemoryAllocateFlags::empty())
            .map_err(|e| {
                tracing::warn!(%category, size = aligned_size, error = %e, "Failed to create new memory block");
                e
            })?;
        blocks.push(block);
        tracing::debug!(%category, blocks = blocks.len(), "Created new memory block");
        telemetry::record_block_created(category, BlockKind::Pooled);

        Ok(Placement {
            block_index: blocks.len() - 1,
            start_unit: 0,
        })
    }
}

#[cfg(test)]
#[path = "placement_tests.rs"]
mod tests;
