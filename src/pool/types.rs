// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Allocation records and usage statistics handed to callers.

use serde::{Deserialize, Serialize};

use super::config::PoolCategory;
use crate::device::{MappedPtr, MemoryHandle};

/// Stable identifier of a block: its category and position in that
/// category's append-only block list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId {
    pub category: PoolCategory,
    pub index: usize,
}

/// How a block is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Shared block carved into allocation units.
    Pooled,
    /// Sized exactly for one resource and never sub-allocated.
    Dedicated,
}

/// A sub-allocated range of device memory.
///
/// Consumed by [`MemoryPool::deallocate`](super::MemoryPool::deallocate), so
/// a range can only be released once.
#[derive(Debug, PartialEq, Eq)]
pub struct Allocation {
    pub(crate) memory: MemoryHandle,
    pub(crate) offset: u64,
    pub(crate) size: u64,
    pub(crate) memory_type_index: u32,
    pub(crate) mapped_ptr: Option<MappedPtr>,
    pub(crate) block: BlockId,
}

impl Allocation {
    pub fn memory(&self) -> MemoryHandle {
        self.memory
    }

    /// Byte offset from the start of the owning block's memory.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reserved bytes (a whole number of allocation units).
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn memory_type_index(&self) -> u32 {
        self.memory_type_index
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped_ptr.is_some()
    }

    /// Host pointer to the first byte of this allocation, if mapped.
    ///
    /// Only valid while the pool that made the allocation is alive. Prefer
    /// [`MemoryPool::write`](super::MemoryPool::write) and
    /// [`MemoryPool::read`](super::MemoryPool::read), which check that.
    pub fn mapped_ptr(&self) -> Option<MappedPtr> {
        self.mapped_ptr
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn category(&self) -> PoolCategory {
        self.block.category
    }
}

/// Used and total bytes across a set of blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub used: u64,
    pub total: u64,
}

impl MemoryUsage {
    pub fn utilization(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.used as f64 / self.total as f64
    }
}

impl std::ops::AddAssign for MemoryUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.used += rhs.used;
        self.total += rhs.total;
    }
}

/// Snapshot of a single block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub id: BlockId,
    pub kind: BlockKind,
    pub size: u64,
    pub used: u64,
    pub allocation_unit: u64,
    pub memory_type_index: u32,
    pub is_mapped: bool,
    pub unit_count: usize,
    pub free_units: usize,
}

/// Per-category statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: PoolCategory,
    pub configured: bool,
    pub pooled_blocks: usize,
    pub dedicated_blocks: usize,
    pub usage: MemoryUsage,
    pub free_units: usize,
    /// Largest contiguous free range in any pooled block.
    pub largest_free_run_bytes: u64,
}

/// Pool-wide statistics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    pub categories: Vec<CategoryStats>,
    pub total: MemoryUsage,
    pub rendering_active: bool,
}
