// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Buffer and image creation on top of the pool.
//!
//! Buffers go through the pooled path unless they need a device address;
//! images always get a dedicated block.

use super::block::{create_block_with_type, find_memory_type};
use super::config::PoolCategory;
use super::manager::{MemoryPool, PoolState};
use super::telemetry;
use super::types::{Allocation, BlockId, BlockKind};
use crate::device::{
    BufferDesc, BufferHandle, BufferUsageFlags, ImageDesc, ImageHandle, MemoryAllocateFlags,
    MemoryDevice, MemoryPropertyFlags, MemoryRequirements, SharingMode,
};
use crate::error::PoolError;

impl PoolState {
    /// Create a block sized exactly to `requirements`, mark it fully used and
    /// keep it in the category's list for accounting and teardown.
    pub(crate) fn allocate_dedicated<D: MemoryDevice + ?Sized>(
        &mut self,
        device: &D,
        category: PoolCategory,
        requirements: &MemoryRequirements,
        properties: MemoryPropertyFlags,
        flags: MemoryAllocateFlags,
    ) -> Result<Allocation, PoolError> {
        let config = *self.configs.get(category)?;
        let memory_type_index =
            find_memory_type(device.memory_types(), requirements.memory_type_bits, properties)?;
        let mut block =
            create_block_with_type(device, &config, requirements.size, memory_type_index, flags)?;
        block.claim_all(requirements.size);

        let blocks = &mut self.blocks[category.index()];
        let allocation = Allocation {
            memory: block.memory,
            offset: 0,
            size: requirements.size,
            memory_type_index,
            mapped_ptr: block.mapped_ptr,
            block: BlockId {
                category,
                index: blocks.len(),
            },
        };
        blocks.push(block);
        telemetry::record_block_created(category, BlockKind::Dedicated);
        self.publish(category);
        Ok(allocation)
    }
}

impl<D: MemoryDevice + ?Sized> MemoryPool<D> {
    /// Create a buffer and bind it to pool memory.
    ///
    /// The category is picked from `usage` and `properties`. Buffers with
    /// `SHADER_DEVICE_ADDRESS` usage get a dedicated block allocated with the
    /// device-address flag; every other buffer is sub-allocated.
    pub fn create_buffer(
        &self,
        size: u64,
        usage: BufferUsageFlags,
        properties: MemoryPropertyFlags,
    ) -> Result<(BufferHandle, Allocation), PoolError> {
        if size == 0 || usage.is_empty() {
            return Err(PoolError::InvalidRequest(format!(
                "buffer needs a non-zero size and usage (size {}, usage {:?})",
                size, usage
            )));
        }
        let category = PoolCategory::for_buffer(usage, properties);
        let device = &*self.device;
        let mut state = self.state.lock();

        // SAFETY: the descriptor was checked above.
        let buffer = unsafe { device.create_buffer(&BufferDesc::new(size, usage)) }?;
        // SAFETY: buffer is live and was created by this device just now.
        let allocation = match unsafe { device.buffer_memory_requirements(buffer) } {
            Ok(requirements) => {
                if usage.contains(BufferUsageFlags::SHADER_DEVICE_ADDRESS) {
                    state.allocate_dedicated(
                        device,
                        category,
                        &requirements,
                        properties,
                        MemoryAllocateFlags::DEVICE_ADDRESS,
                    )
                } else {
                    state
                        .allocate(device, category, requirements.size, requirements.alignment)
                        .map_err(|e| PoolError::PoolAllocationFailed(Box::new(e)))
                        .and_then(|a| check_type(&mut state, a, &requirements))
                }
            }
            Err(e) => Err(e.into()),
        };
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                // SAFETY: the buffer was never bound or handed out.
                unsafe { device.destroy_buffer(buffer) };
                return Err(e);
            }
        };

        // SAFETY: both handles are live and come from this device.
        let bound =
            unsafe { device.bind_buffer_memory(buffer, allocation.memory, allocation.offset) };
        if let Err(e) = bound {
            // SAFETY: the bind failed, so nothing uses the buffer.
            unsafe { device.destroy_buffer(buffer) };
            state.deallocate(allocation);
            return Err(e.into());
        }
        state.buffers.insert(buffer);
        tracing::debug!(
            %category,
            size,
            offset = allocation.offset,
            dedicated = usage.contains(BufferUsageFlags::SHADER_DEVICE_ADDRESS),
            "Created buffer"
        );
        Ok((buffer, allocation))
    }

    /// Create an image in its own dedicated block of the texture category.
    pub fn create_image(
        &self,
        desc: &ImageDesc,
        properties: MemoryPropertyFlags,
    ) -> Result<(ImageHandle, Allocation), PoolError> {
        check_image_desc(desc)?;
        let device = &*self.device;
        let mut state = self.state.lock();

        // SAFETY: the descriptor was checked above.
        let image = unsafe { device.create_image(desc) }?;
        // SAFETY: image is live and was created by this device just now.
        let allocation = unsafe { device.image_memory_requirements(image) }
            .map_err(PoolError::from)
            .and_then(|requirements| {
                state.allocate_dedicated(
                    device,
                    PoolCategory::Texture,
                    &requirements,
                    properties,
                    MemoryAllocateFlags::empty(),
                )
            });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                // SAFETY: the image was never bound or handed out.
                unsafe { device.destroy_image(image) };
                return Err(e);
            }
        };

        // SAFETY: both handles are live and come from this device.
        let bound =
            unsafe { device.bind_image_memory(image, allocation.memory, allocation.offset) };
        if let Err(e) = bound {
            // SAFETY: the bind failed, so nothing uses the image.
            unsafe { device.destroy_image(image) };
            state.deallocate(allocation);
            return Err(e.into());
        }
        state.images.insert(image);
        tracing::debug!(
            width = desc.width,
            height = desc.height,
            format = ?desc.format,
            size = allocation.size,
            "Created image"
        );
        Ok((image, allocation))
    }

    /// Destroy a buffer and return its memory to the pool.
    ///
    /// A buffer this pool did not create, or already destroyed, is logged and
    /// left alone; the allocation is still released.
    pub fn destroy_buffer(&self, buffer: BufferHandle, allocation: Allocation) {
        let mut state = self.state.lock();
        if state.buffers.remove(&buffer) {
            // SAFETY: the pool created this buffer and it has not been destroyed.
            unsafe { self.device.destroy_buffer(buffer) };
        } else {
            tracing::warn!(
                buffer = buffer.as_raw(),
                "Buffer not created by this pool; not destroyed"
            );
        }
        state.deallocate(allocation);
    }

    /// Destroy an image and release its dedicated block's units.
    ///
    /// Unknown images are logged and left alone, like in
    /// [`destroy_buffer`](Self::destroy_buffer).
    pub fn destroy_image(&self, image: ImageHandle, allocation: Allocation) {
        let mut state = self.state.lock();
        if state.images.remove(&image) {
            // SAFETY: the pool created this image and it has not been destroyed.
            unsafe { self.device.destroy_image(image) };
        } else {
            tracing::warn!(
                image = image.as_raw(),
                "Image not created by this pool; not destroyed"
            );
        }
        state.deallocate(allocation);
    }
}

/// Reject image descriptors the native API would not accept.
fn check_image_desc(desc: &ImageDesc) -> Result<(), PoolError> {
    let reason = if desc.width == 0 || desc.height == 0 {
        format!("image extent {}x{} must be non-zero", desc.width, desc.height)
    } else if desc.usage.is_empty() {
        "image usage must not be empty".to_string()
    } else if desc.effective_mip_levels() > desc.max_mip_levels() {
        format!(
            "{} mip levels requested, a {}x{} image has at most {}",
            desc.mip_levels,
            desc.width,
            desc.height,
            desc.max_mip_levels()
        )
    } else if desc.sharing_mode == SharingMode::Concurrent && desc.queue_family_indices.len() < 2 {
        "concurrent sharing needs at least two queue families".to_string()
    } else {
        return Ok(());
    };
    Err(PoolError::InvalidRequest(reason))
}

/// Reject a pooled allocation whose block type the resource cannot use.
fn check_type(
    state: &mut PoolState,
    allocation: Allocation,
    requirements: &MemoryRequirements,
) -> Result<Allocation, PoolError> {
    if requirements.memory_type_bits & (1 << allocation.memory_type_index) != 0 {
        return Ok(allocation);
    }
    let properties = state
        .configs
        .get(allocation.category())
        .map(|c| c.required_properties)
        .unwrap_or_default();
    state.deallocate(allocation);
    Err(PoolError::NoSuitableMemoryType {
        type_bits: requirements.memory_type_bits,
        properties,
    })
}
