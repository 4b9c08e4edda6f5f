// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Memory blocks and their creation.
//!
//! A block owns one native memory object, an optional persistent mapping and
//! a free list with one entry per allocation unit (`true` = free). Blocks
//! never grow or shrink.

use super::config::PoolConfig;
use super::types::BlockKind;
use crate::device::{
    BufferDesc, MappedPtr, MemoryAllocateFlags, MemoryDevice, MemoryHandle, MemoryPropertyFlags,
    MemoryType, PROBE_BUFFER_USAGE,
};
use crate::error::PoolError;

#[derive(Debug)]
pub(crate) struct MemoryBlock {
    pub(crate) memory: MemoryHandle,
    pub(crate) size: u64,
    /// Bytes claimed; informational only, placement reads the free list.
    pub(crate) used: u64,
    pub(crate) memory_type_index: u32,
    pub(crate) mapped_ptr: Option<MappedPtr>,
    pub(crate) free_list: Vec<bool>,
    /// Copied from the category config at creation time.
    pub(crate) allocation_unit: u64,
    pub(crate) kind: BlockKind,
}

impl MemoryBlock {
    fn new(
        memory: MemoryHandle,
        size: u64,
        memory_type_index: u32,
        mapped_ptr: Option<MappedPtr>,
        allocation_unit: u64,
        kind: BlockKind,
    ) -> Self {
        let units = (size / allocation_unit) as usize;
        Self {
            memory,
            size,
            used: 0,
            memory_type_index,
            mapped_ptr,
            free_list: vec![true; units],
            allocation_unit,
            kind,
        }
    }

    pub(crate) fn unit_count(&self) -> usize {
        self.free_list.len()
    }

    /// Units needed to hold `bytes` in this block.
    pub(crate) fn units_for(&self, bytes: u64) -> usize {
        bytes.div_ceil(self.allocation_unit) as usize
    }

    pub(crate) fn claim(&mut self, start_unit: usize, units: usize) {
        for slot in &mut self.free_list[start_unit..start_unit + units] {
            *slot = false;
        }
        self.used += units as u64 * self.allocation_unit;
    }

    /// Mark a run free again. Units past the end of the list are ignored.
    pub(crate) fn release(&mut self, start_unit: usize, units: usize, bytes: u64) {
        let end = (start_unit + units).min(self.free_list.len());
        if start_unit < end {
            for slot in &mut self.free_list[start_unit..end] {
                *slot = true;
            }
        }
        self.used = self.used.saturating_sub(bytes);
    }

    /// Consume the whole block for a single resource.
    pub(crate) fn claim_all(&mut self, used: u64) {
        self.free_list.fill(false);
        self.used = used;
    }

    pub(crate) fn free_units(&self) -> usize {
        self.free_list.iter().filter(|free| **free).count()
    }

    pub(crate) fn largest_free_run(&self) -> usize {
        let mut best = 0;
        let mut run = 0;
        for free in &self.free_list {
            if *free {
                run += 1;
                best = best.max(run);
            } else {
                run = 0;
            }
        }
        best
    }

    /// Host pointer for a byte offset inside this block.
    pub(crate) fn mapped_at(&self, offset: u64) -> Option<MappedPtr> {
        // SAFETY: callers pass offsets of claimed runs, which lie inside the mapping.
        self.mapped_ptr.map(|ptr| unsafe { ptr.add(offset) })
    }
}

/// First memory type allowed by `type_bits` whose flags contain `properties`.
pub(crate) fn find_memory_type(
    memory_types: &[MemoryType],
    type_bits: u32,
    properties: MemoryPropertyFlags,
) -> Result<u32, PoolError> {
    memory_types
        .iter()
        .enumerate()
        .take(32)
        .find(|(i, t)| type_bits & (1 << i) != 0 && t.property_flags.contains(properties))
        .map(|(i, _)| i as u32)
        .ok_or(PoolError::NoSuitableMemoryType {
            type_bits,
            properties,
        })
}

fn round_up(value: u64, unit: u64) -> Result<u64, PoolError> {
    value
        .checked_next_multiple_of(unit)
        .ok_or_else(|| PoolError::InvalidRequest(format!("size {} overflows", value)))
}

/// Allocate memory and map it when the type is host-visible. Memory is freed
/// again if mapping fails.
fn allocate_backing<D: MemoryDevice + ?Sized>(
    device: &D,
    size: u64,
    memory_type_index: u32,
    flags: MemoryAllocateFlags,
) -> Result<(MemoryHandle, Option<MappedPtr>), PoolError> {
    let host_visible = device
        .memory_types()
        .get(memory_type_index as usize)
        .map(|t| t.property_flags.contains(MemoryPropertyFlags::HOST_VISIBLE))
        .ok_or(PoolError::InvalidMemoryTypeIndex {
            index: memory_type_index,
            count: device.memory_types().len(),
        })?;

    // SAFETY: size is a non-zero multiple of a validated unit and the type
    // index was checked above.
    let memory = unsafe { device.allocate_memory(size, memory_type_index, flags) }?;
    if !host_visible {
        return Ok((memory, None));
    }
    // SAFETY: memory was just allocated from a host-visible type and is unmapped.
    match unsafe { device.map_memory(memory, size) } {
        Ok(ptr) => Ok((memory, Some(ptr))),
        Err(e) => {
            // SAFETY: nothing is bound to or maps the fresh memory object.
            unsafe { device.free_memory(memory) };
            Err(e.into())
        }
    }
}

/// Create a pooled block of at least `max(size, config.block_size)` bytes.
///
/// The memory type comes from probing a buffer that covers every pooled
/// usage; the block is mapped when that type is host-visible.
pub(crate) fn create_block<D: MemoryDevice + ?Sized>(
    device: &D,
    config: &PoolConfig,
    size: u64,
    flags: MemoryAllocateFlags,
) -> Result<MemoryBlock, PoolError> {
    config.validate()?;
    let unit = config.allocation_unit;
    let requested = round_up(size.max(config.block_size), unit)?;

    // SAFETY: the probe has a non-zero size and standard buffer usages; it is
    // destroyed before anything else can see it.
    let requirements = unsafe {
        let probe = device.create_buffer(&BufferDesc::new(requested, PROBE_BUFFER_USAGE))?;
        let requirements = device.buffer_memory_requirements(probe);
        device.destroy_buffer(probe);
        requirements
    }?;

    let memory_type_index = find_memory_type(
        device.memory_types(),
        requirements.memory_type_bits,
        config.required_properties,
    )?;
    let block_size = round_up(requirements.size.max(requested), unit)?;
    let (memory, mapped_ptr) = allocate_backing(device, block_size, memory_type_index, flags)?;

    tracing::debug!(
        size = block_size,
        unit,
        memory_type = memory_type_index,
        mapped = mapped_ptr.is_some(),
        "Created pooled memory block"
    );
    Ok(MemoryBlock::new(
        memory,
        block_size,
        memory_type_index,
        mapped_ptr,
        unit,
        BlockKind::Pooled,
    ))
}

/// Create a dedicated block of exactly `size` bytes (rounded to whole units)
/// from a caller-chosen memory type.
pub(crate) fn create_block_with_type<D: MemoryDevice + ?Sized>(
    device: &D,
    config: &PoolConfig,
    size: u64,
    memory_type_index: u32,
    flags: MemoryAllocateFlags,
) -> Result<MemoryBlock, PoolError> {
    config.validate()?;
    let unit = config.allocation_unit;
    let block_size = round_up(size, unit)?;
    let (memory, mapped_ptr) = allocate_backing(device, block_size, memory_type_index, flags)?;

    tracing::debug!(
        size = block_size,
        memory_type = memory_type_index,
        flags = ?flags,
        "Created dedicated memory block"
    );
    Ok(MemoryBlock::new(
        memory,
        block_size,
        memory_type_index,
        mapped_ptr,
        unit,
        BlockKind::Dedicated,
    ))
}
