// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! The memory pool and its raw allocation API.
//!
//! One pool-wide mutex guards configuration, block lists, free lists and the
//! rendering flag. Every public operation holds it for its full duration,
//! including the device calls it makes.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::block::{create_block, MemoryBlock};
use super::config::{PoolCategory, PoolConfig, PoolConfigRegistry};
use super::placement::align_up;
use super::telemetry;
use super::types::{
    Allocation, BlockId, BlockInfo, BlockKind, CategoryStats, MemoryUsage, PoolStats,
};
use crate::device::{
    BufferHandle, ImageHandle, MappedPtr, MemoryAllocateFlags, MemoryDevice, MemoryPropertyFlags,
};
use crate::error::PoolError;

/// Everything behind the pool lock.
#[derive(Debug, Default)]
pub(crate) struct PoolState {
    pub(crate) configs: PoolConfigRegistry,
    /// Append-only block lists, indexed by [`PoolCategory::index`].
    pub(crate) blocks: [Vec<MemoryBlock>; PoolCategory::COUNT],
    pub(crate) rendering_active: bool,
    /// Resources created through the pool and not yet destroyed.
    pub(crate) buffers: HashSet<BufferHandle>,
    pub(crate) images: HashSet<ImageHandle>,
}

impl PoolState {
    pub(crate) fn usage(&self, category: PoolCategory) -> MemoryUsage {
        self.blocks[category.index()]
            .iter()
            .fold(MemoryUsage::default(), |mut acc, block| {
                acc.used += block.used;
                acc.total += block.size;
                acc
            })
    }

    pub(crate) fn publish(&self, category: PoolCategory) {
        telemetry::record_usage(category, self.usage(category));
    }

    pub(crate) fn allocate<D: MemoryDevice + ?Sized>(
        &mut self,
        device: &D,
        category: PoolCategory,
        size: u64,
        alignment: u64,
    ) -> Result<Allocation, PoolError> {
        if size == 0 {
            return Err(PoolError::InvalidRequest(
                "allocation size must be non-zero".to_string(),
            ));
        }
        let alignment = alignment.max(1);
        let aligned_size = align_up(size, alignment)
            .ok_or_else(|| PoolError::InvalidRequest(format!("size {} overflows", size)))?;

        let placement = self.find_suitable_block(device, category, size, alignment)?;
        let block = &mut self.blocks[category.index()][placement.block_index];
        let units = block.units_for(aligned_size);
        block.claim(placement.start_unit, units);

        let offset = placement.start_unit as u64 * block.allocation_unit;
        let allocation = Allocation {
            memory: block.memory,
            offset,
            size: units as u64 * block.allocation_unit,
            memory_type_index: block.memory_type_index,
            mapped_ptr: block.mapped_at(offset),
            block: BlockId {
                category,
                index: placement.block_index,
            },
        };
        tracing::trace!(
            %category,
            block = placement.block_index,
            offset,
            size = allocation.size,
            "Allocated from pool"
        );
        self.publish(category);
        Ok(allocation)
    }

    /// Locate the block owning `allocation`: first through its block id,
    /// then by memory handle across every category. Returns the category
    /// slot and block index.
    fn locate(&self, allocation: &Allocation) -> Option<(usize, usize)> {
        let id = allocation.block;
        let slot = id.category.index();
        let direct = self.blocks[slot]
            .get(id.index)
            .is_some_and(|b| b.memory == allocation.memory);
        if direct {
            return Some((slot, id.index));
        }
        self.blocks.iter().enumerate().find_map(|(slot, blocks)| {
            blocks
                .iter()
                .position(|b| b.memory == allocation.memory)
                .map(|index| (slot, index))
        })
    }

    fn owning_block(&mut self, allocation: &Allocation) -> Option<&mut MemoryBlock> {
        let (slot, index) = self.locate(allocation)?;
        self.blocks[slot].get_mut(index)
    }

    /// Host pointer to `len` bytes at `offset` inside `allocation`, checked
    /// against the owning block's current mapping.
    fn mapped_range(
        &self,
        allocation: &Allocation,
        offset: u64,
        len: usize,
    ) -> Result<MappedPtr, PoolError> {
        let (slot, index) = self
            .locate(allocation)
            .ok_or(PoolError::UnknownAllocation)?;
        let block = &self.blocks[slot][index];
        let inside_block = allocation
            .offset
            .checked_add(allocation.size)
            .is_some_and(|end| end <= block.size);
        if !inside_block {
            return Err(PoolError::UnknownAllocation);
        }
        let base = block.mapped_at(allocation.offset).ok_or(PoolError::NotMapped)?;
        let len = len as u64;
        if offset.checked_add(len).map_or(true, |end| end > allocation.size) {
            return Err(PoolError::OutOfBounds {
                offset,
                len,
                size: allocation.size,
            });
        }
        // SAFETY: allocation.offset + offset + len <= block.size, all inside
        // the block's mapping.
        Ok(unsafe { base.add(offset) })
    }

    /// Release an allocation's units. Returns false when no block owns it.
    pub(crate) fn deallocate(&mut self, allocation: Allocation) -> bool {
        let category = allocation.block.category;
        let Some(block) = self.owning_block(&allocation) else {
            tracing::warn!(
                memory = allocation.memory.as_raw(),
                offset = allocation.offset,
                size = allocation.size,
                "Could not find memory block for deallocation; allocation leaked"
            );
            return false;
        };
        let start_unit = (allocation.offset / block.allocation_unit) as usize;
        let units = block.units_for(allocation.size);
        block.release(start_unit, units, allocation.size);
        tracing::trace!(
            %category,
            offset = allocation.offset,
            size = allocation.size,
            "Released allocation"
        );
        self.publish(category);
        true
    }

    fn block_info(&self, id: BlockId) -> Option<BlockInfo> {
        self.blocks[id.category.index()]
            .get(id.index)
            .map(|block| BlockInfo {
                id,
                kind: block.kind,
                size: block.size,
                used: block.used,
                allocation_unit: block.allocation_unit,
                memory_type_index: block.memory_type_index,
                is_mapped: block.mapped_ptr.is_some(),
                unit_count: block.unit_count(),
                free_units: block.free_units(),
            })
    }

    fn category_stats(&self, category: PoolCategory) -> CategoryStats {
        let blocks = &self.blocks[category.index()];
        let pooled = blocks.iter().filter(|b| b.kind == BlockKind::Pooled);
        CategoryStats {
            category,
            configured: self.configs.is_configured(category),
            pooled_blocks: pooled.clone().count(),
            dedicated_blocks: blocks
                .iter()
                .filter(|b| b.kind == BlockKind::Dedicated)
                .count(),
            usage: self.usage(category),
            free_units: pooled.clone().map(MemoryBlock::free_units).sum(),
            largest_free_run_bytes: pooled
                .map(|b| b.largest_free_run() as u64 * b.allocation_unit)
                .max()
                .unwrap_or(0),
        }
    }
}

/// Pooled GPU memory allocator.
///
/// Shared between renderer components through `Arc<MemoryPool<D>>`; every
/// method takes `&self`.
pub struct MemoryPool<D: MemoryDevice + ?Sized> {
    pub(crate) device: Arc<D>,
    pub(crate) state: Mutex<PoolState>,
}

impl<D: MemoryDevice + ?Sized> MemoryPool<D> {
    /// Create a pool with no categories configured.
    pub fn new(device: Arc<D>) -> Self {
        Self::with_registry(device, PoolConfigRegistry::new())
    }

    /// Create a pool with the built-in configuration for every category.
    pub fn with_defaults(device: Arc<D>) -> Self {
        Self::with_registry(device, PoolConfigRegistry::with_defaults())
    }

    pub fn with_registry(device: Arc<D>, configs: PoolConfigRegistry) -> Self {
        Self {
            device,
            state: Mutex::new(PoolState {
                configs,
                ..Default::default()
            }),
        }
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Insert or overwrite a category's configuration.
    ///
    /// Only blocks created afterwards use the new values.
    pub fn configure(
        &self,
        category: PoolCategory,
        block_size: u64,
        allocation_unit: u64,
        required_properties: MemoryPropertyFlags,
    ) {
        self.state
            .lock()
            .configs
            .configure(category, block_size, allocation_unit, required_properties);
    }

    /// Install the built-in configuration for all five categories.
    pub fn initialize_defaults(&self) {
        self.state.lock().configs.initialize_defaults();
    }

    pub fn config(&self, category: PoolCategory) -> Result<PoolConfig, PoolError> {
        self.state.lock().configs.get(category).copied()
    }

    /// Sub-allocate `size` bytes aligned to `alignment` from `category`.
    ///
    /// The returned size is rounded up to whole allocation units. A new block
    /// is created when no existing block has an aligned free run.
    pub fn allocate(
        &self,
        category: PoolCategory,
        size: u64,
        alignment: u64,
    ) -> Result<Allocation, PoolError> {
        self.state
            .lock()
            .allocate(&*self.device, category, size, alignment)
    }

    /// Return an allocation's units to its block.
    ///
    /// An allocation no block owns is logged and leaked.
    pub fn deallocate(&self, allocation: Allocation) {
        self.state.lock().deallocate(allocation);
    }

    /// Copy `data` into an allocation's mapped range at `offset`.
    ///
    /// The owning block is looked up under the pool lock, so an allocation
    /// from another pool fails with [`PoolError::UnknownAllocation`].
    pub fn write(
        &self,
        allocation: &Allocation,
        offset: u64,
        data: &[u8],
    ) -> Result<(), PoolError> {
        let state = self.state.lock();
        let dst = state.mapped_range(allocation, offset, data.len())?;
        // SAFETY: the range is mapped, in bounds and the pool lock serializes
        // access to it.
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), dst.as_ptr(), data.len()) };
        Ok(())
    }

    /// Copy bytes out of an allocation's mapped range at `offset`.
    pub fn read(
        &self,
        allocation: &Allocation,
        offset: u64,
        out: &mut [u8],
    ) -> Result<(), PoolError> {
        let state = self.state.lock();
        let src = state.mapped_range(allocation, offset, out.len())?;
        // SAFETY: the range is mapped, in bounds and the pool lock serializes
        // access to it.
        unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), out.as_mut_ptr(), out.len()) };
        Ok(())
    }

    pub fn memory_usage(&self, category: PoolCategory) -> MemoryUsage {
        self.state.lock().usage(category)
    }

    pub fn total_memory_usage(&self) -> MemoryUsage {
        let state = self.state.lock();
        PoolCategory::ALL
            .into_iter()
            .fold(MemoryUsage::default(), |mut acc, c| {
                acc += state.usage(c);
                acc
            })
    }

    /// Create one block for every configured category that has none yet.
    ///
    /// The first failure aborts the pass; blocks already created stay.
    /// Returns the number of blocks created.
    pub fn pre_allocate_pools(&self) -> Result<usize, PoolError> {
        let mut state = self.state.lock();
        tracing::info!("Pre-allocating initial memory blocks for pools");

        let pending: Vec<(PoolCategory, PoolConfig)> = state
            .configs
            .iter()
            .filter(|(category, _)| state.blocks[category.index()].is_empty())
            .map(|(category, config)| (category, *config))
            .collect();

        let mut created = 0;
        for (category, config) in pending {
            let block = create_block(
                &*self.device,
                &config,
                config.block_size,
                MemoryAllocateFlags::empty(),
            )
            .map_err(|e| {
                tracing::warn!(%category, error = %e, "Failed to pre-allocate memory pools");
                e
            })?;
            state.blocks[category.index()].push(block);
            telemetry::record_block_created(category, BlockKind::Pooled);
            state.publish(category);
            created += 1;
            tracing::debug!(%category, "Pre-allocated block");
        }

        tracing::info!(created, "Memory pool pre-allocation completed");
        Ok(created)
    }

    /// Record whether a latency-sensitive phase is running. Advisory only.
    pub fn set_rendering_active(&self, active: bool) {
        self.state.lock().rendering_active = active;
    }

    pub fn is_rendering_active(&self) -> bool {
        self.state.lock().rendering_active
    }

    pub fn block_count(&self, category: PoolCategory) -> usize {
        self.state.lock().blocks[category.index()].len()
    }

    pub fn block_info(&self, id: BlockId) -> Option<BlockInfo> {
        self.state.lock().block_info(id)
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        let categories: Vec<CategoryStats> = PoolCategory::ALL
            .into_iter()
            .map(|c| state.category_stats(c))
            .collect();
        let total = categories
            .iter()
            .fold(MemoryUsage::default(), |mut acc, c| {
                acc += c.usage;
                acc
            });
        PoolStats {
            categories,
            total,
            rendering_active: state.rendering_active,
        }
    }
}

impl<D: MemoryDevice + ?Sized> Drop for MemoryPool<D> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        let resources = state.buffers.len() + state.images.len();
        for buffer in state.buffers.drain() {
            // SAFETY: created by the pool and never destroyed.
            unsafe { self.device.destroy_buffer(buffer) };
        }
        for image in state.images.drain() {
            // SAFETY: created by the pool and never destroyed.
            unsafe { self.device.destroy_image(image) };
        }
        let mut freed = 0usize;
        for block in state.blocks.iter_mut().flat_map(|blocks| blocks.drain(..)) {
            // SAFETY: the pool allocated this memory and frees it exactly once.
            unsafe { self.device.free_memory(block.memory) };
            freed += 1;
        }
        tracing::debug!(blocks = freed, resources, "Memory pool released");
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
