// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Host-backed device.
//!
//! Simulates a GPU with a configurable memory-type table and per-heap
//! capacity. Host-visible memory is backed by real host storage so mapped
//! pointers can be written and read; device-local memory is bookkeeping only.
//! Bindings are validated for range and alignment.

use std::collections::HashMap;
use std::ptr::NonNull;

use parking_lot::Mutex;

use super::flags::{MemoryAllocateFlags, MemoryPropertyFlags};
use super::types::{
    BufferDesc, BufferHandle, ImageDesc, ImageHandle, MappedPtr, MemoryHandle, MemoryHeap,
    MemoryRequirements, MemoryType,
};
use super::{DeviceError, MemoryDevice};

const MIB: u64 = 1024 * 1024;

/// Configuration of a [`HostDevice`].
#[derive(Debug, Clone)]
pub struct HostDeviceConfig {
    pub memory_types: Vec<MemoryType>,
    pub memory_heaps: Vec<MemoryHeap>,
    /// Alignment (and size granularity) reported for buffers.
    pub buffer_alignment: u64,
    /// Alignment (and size granularity) reported for images.
    pub image_alignment: u64,
}

impl Default for HostDeviceConfig {
    /// Discrete-GPU layout: one device-local heap and one host heap.
    fn default() -> Self {
        Self {
            memory_types: vec![
                MemoryType {
                    property_flags: MemoryPropertyFlags::DEVICE_LOCAL,
                    heap_index: 0,
                },
                MemoryType {
                    property_flags: MemoryPropertyFlags::HOST_VISIBLE
                        | MemoryPropertyFlags::HOST_COHERENT,
                    heap_index: 1,
                },
                MemoryType {
                    property_flags: MemoryPropertyFlags::HOST_VISIBLE
                        | MemoryPropertyFlags::HOST_COHERENT
                        | MemoryPropertyFlags::HOST_CACHED,
                    heap_index: 1,
                },
            ],
            memory_heaps: vec![MemoryHeap { size: 1024 * MIB }, MemoryHeap { size: 512 * MIB }],
            buffer_alignment: 256,
            image_alignment: 4096,
        }
    }
}

impl HostDeviceConfig {
    /// Default layout with explicit heap capacities.
    pub fn with_heap_sizes(device_local: u64, host_visible: u64) -> Self {
        Self {
            memory_heaps: vec![MemoryHeap { size: device_local }, MemoryHeap { size: host_visible }],
            ..Default::default()
        }
    }

    /// Unified-memory layout: every type is device-local and host-visible.
    pub fn unified(heap_size: u64) -> Self {
        Self {
            memory_types: vec![MemoryType {
                property_flags: MemoryPropertyFlags::DEVICE_LOCAL
                    | MemoryPropertyFlags::HOST_VISIBLE
                    | MemoryPropertyFlags::HOST_COHERENT,
                heap_index: 0,
            }],
            memory_heaps: vec![MemoryHeap { size: heap_size }],
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct HostMemory {
    size: u64,
    heap_index: u32,
    flags: MemoryAllocateFlags,
    storage: Option<Box<[u8]>>,
    mapped: bool,
}

#[derive(Debug)]
struct HostResource {
    requirements: MemoryRequirements,
    binding: Option<(MemoryHandle, u64)>,
}

#[derive(Debug, Default)]
struct HostState {
    next_id: u64,
    memories: HashMap<u64, HostMemory>,
    buffers: HashMap<u64, HostResource>,
    images: HashMap<u64, HostResource>,
    heap_used: Vec<u64>,
}

impl HostState {
    fn next_handle(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn bind(
        memories: &HashMap<u64, HostMemory>,
        resource: &mut HostResource,
        memory: MemoryHandle,
        offset: u64,
    ) -> Result<(), DeviceError> {
        let mem = memories
            .get(&memory.as_raw())
            .ok_or_else(|| DeviceError::InvalidHandle(format!("memory {}", memory.as_raw())))?;
        let req = resource.requirements;
        if offset % req.alignment != 0 {
            return Err(DeviceError::Misaligned {
                offset,
                alignment: req.alignment,
            });
        }
        if offset.checked_add(req.size).map_or(true, |end| end > mem.size) {
            return Err(DeviceError::BindOutOfRange {
                offset,
                size: req.size,
                memory_size: mem.size,
            });
        }
        resource.binding = Some((memory, offset));
        Ok(())
    }
}

/// Simulated device backed by host memory.
///
/// Every handle is looked up in the device's own tables, so a stale or
/// foreign handle yields [`DeviceError::InvalidHandle`] instead of touching
/// memory. Mapped pointers still dangle once their memory is freed.
#[derive(Debug)]
pub struct HostDevice {
    config: HostDeviceConfig,
    state: Mutex<HostState>,
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new(HostDeviceConfig::default())
    }
}

impl HostDevice {
    pub fn new(config: HostDeviceConfig) -> Self {
        let state = HostState {
            heap_used: vec![0; config.memory_heaps.len()],
            ..Default::default()
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    fn all_types_mask(&self) -> u32 {
        match self.config.memory_types.len() {
            n if n >= 32 => u32::MAX,
            n => (1u32 << n) - 1,
        }
    }

    /// Bytes currently allocated from a heap.
    pub fn heap_usage(&self, heap_index: u32) -> u64 {
        self.state
            .lock()
            .heap_used
            .get(heap_index as usize)
            .copied()
            .unwrap_or(0)
    }

    pub fn live_memory_objects(&self) -> usize {
        self.state.lock().memories.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    pub fn live_images(&self) -> usize {
        self.state.lock().images.len()
    }

    /// Allocation flags a memory object was created with.
    pub fn memory_allocate_flags(&self, memory: MemoryHandle) -> Option<MemoryAllocateFlags> {
        self.state.lock().memories.get(&memory.as_raw()).map(|m| m.flags)
    }

    pub fn buffer_binding(&self, buffer: BufferHandle) -> Option<(MemoryHandle, u64)> {
        self.state
            .lock()
            .buffers
            .get(&buffer.as_raw())
            .and_then(|b| b.binding)
    }

    pub fn image_binding(&self, image: ImageHandle) -> Option<(MemoryHandle, u64)> {
        self.state
            .lock()
            .images
            .get(&image.as_raw())
            .and_then(|i| i.binding)
    }
}

fn round_up(value: u64, granularity: u64) -> Result<u64, DeviceError> {
    value
        .checked_next_multiple_of(granularity)
        .ok_or(DeviceError::OutOfDeviceMemory {
            requested: value,
            heap: 0,
        })
}

impl MemoryDevice for HostDevice {
    fn memory_types(&self) -> &[MemoryType] {
        &self.config.memory_types
    }

    unsafe fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandle, DeviceError> {
        if desc.size == 0 {
            return Err(DeviceError::InvalidDescriptor(
                "buffer size must be non-zero".to_string(),
            ));
        }
        let requirements = MemoryRequirements {
            size: round_up(desc.size, self.config.buffer_alignment)?,
            alignment: self.config.buffer_alignment,
            memory_type_bits: self.all_types_mask(),
        };
        let mut state = self.state.lock();
        let id = state.next_handle();
        state.buffers.insert(
            id,
            HostResource {
                requirements,
                binding: None,
            },
        );
        Ok(BufferHandle::from_raw(id))
    }

    unsafe fn destroy_buffer(&self, buffer: BufferHandle) {
        self.state.lock().buffers.remove(&buffer.as_raw());
    }

    unsafe fn buffer_memory_requirements(
        &self,
        buffer: BufferHandle,
    ) -> Result<MemoryRequirements, DeviceError> {
        self.state
            .lock()
            .buffers
            .get(&buffer.as_raw())
            .map(|b| b.requirements)
            .ok_or_else(|| DeviceError::InvalidHandle(format!("buffer {}", buffer.as_raw())))
    }

    unsafe fn create_image(&self, desc: &ImageDesc) -> Result<ImageHandle, DeviceError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(DeviceError::InvalidDescriptor(format!(
                "image extent {}x{} must be non-zero",
                desc.width, desc.height
            )));
        }
        let texel = desc.format.bytes_per_texel();
        let bytes: u64 = (0..desc.effective_mip_levels().min(32))
            .map(|level| {
                let w = u64::from((desc.width >> level).max(1));
                let h = u64::from((desc.height >> level).max(1));
                w.saturating_mul(h).saturating_mul(texel)
            })
            .fold(0, u64::saturating_add);
        let requirements = MemoryRequirements {
            size: round_up(bytes, self.config.image_alignment)?,
            alignment: self.config.image_alignment,
            memory_type_bits: self.all_types_mask(),
        };
        let mut state = self.state.lock();
        let id = state.next_handle();
        state.images.insert(
            id,
            HostResource {
                requirements,
                binding: None,
            },
        );
        Ok(ImageHandle::from_raw(id))
    }

    unsafe fn destroy_image(&self, image: ImageHandle) {
        self.state.lock().images.remove(&image.as_raw());
    }

    unsafe fn image_memory_requirements(
        &self,
        image: ImageHandle,
    ) -> Result<MemoryRequirements, DeviceError> {
        self.state
            .lock()
            .images
            .get(&image.as_raw())
            .map(|i| i.requirements)
            .ok_or_else(|| DeviceError::InvalidHandle(format!("image {}", image.as_raw())))
    }

    unsafe fn allocate_memory(
        &self,
        size: u64,
        memory_type_index: u32,
        flags: MemoryAllocateFlags,
    ) -> Result<MemoryHandle, DeviceError> {
        let memory_type = self
            .config
            .memory_types
            .get(memory_type_index as usize)
            .copied()
            .ok_or(DeviceError::InvalidMemoryType(memory_type_index))?;
        if size == 0 {
            return Err(DeviceError::InvalidDescriptor(
                "allocation size must be non-zero".to_string(),
            ));
        }
        let heap = memory_type.heap_index;
        let capacity = self
            .config
            .memory_heaps
            .get(heap as usize)
            .map(|h| h.size)
            .unwrap_or(0);

        let mut state = self.state.lock();
        let used = state.heap_used.get(heap as usize).copied().unwrap_or(0);
        if used.saturating_add(size) > capacity {
            return Err(DeviceError::OutOfDeviceMemory {
                requested: size,
                heap,
            });
        }

        let storage = if memory_type
            .property_flags
            .contains(MemoryPropertyFlags::HOST_VISIBLE)
        {
            let len = usize::try_from(size).map_err(|_| DeviceError::OutOfHostMemory)?;
            Some(vec![0u8; len].into_boxed_slice())
        } else {
            None
        };

        let id = state.next_handle();
        state.memories.insert(
            id,
            HostMemory {
                size,
                heap_index: heap,
                flags,
                storage,
                mapped: false,
            },
        );
        if let Some(slot) = state.heap_used.get_mut(heap as usize) {
            *slot += size;
        }
        Ok(MemoryHandle::from_raw(id))
    }

    unsafe fn free_memory(&self, memory: MemoryHandle) {
        let mut state = self.state.lock();
        if let Some(mem) = state.memories.remove(&memory.as_raw()) {
            if let Some(slot) = state.heap_used.get_mut(mem.heap_index as usize) {
                *slot = slot.saturating_sub(mem.size);
            }
        }
    }

    unsafe fn map_memory(&self, memory: MemoryHandle, size: u64) -> Result<MappedPtr, DeviceError> {
        let mut state = self.state.lock();
        let mem = state
            .memories
            .get_mut(&memory.as_raw())
            .ok_or_else(|| DeviceError::InvalidHandle(format!("memory {}", memory.as_raw())))?;
        if mem.mapped {
            return Err(DeviceError::MemoryMapFailed(
                "memory is already mapped".to_string(),
            ));
        }
        if size > mem.size {
            return Err(DeviceError::MemoryMapFailed(format!(
                "map size {} exceeds memory size {}",
                size, mem.size
            )));
        }
        let storage = mem.storage.as_mut().ok_or_else(|| {
            DeviceError::MemoryMapFailed("memory type is not host-visible".to_string())
        })?;
        let ptr = NonNull::new(storage.as_mut_ptr())
            .ok_or_else(|| DeviceError::MemoryMapFailed("null storage".to_string()))?;
        mem.mapped = true;
        Ok(MappedPtr::new(ptr))
    }

    unsafe fn bind_buffer_memory(
        &self,
        buffer: BufferHandle,
        memory: MemoryHandle,
        offset: u64,
    ) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        let HostState {
            memories, buffers, ..
        } = &mut *state;
        let resource = buffers
            .get_mut(&buffer.as_raw())
            .ok_or_else(|| DeviceError::InvalidHandle(format!("buffer {}", buffer.as_raw())))?;
        HostState::bind(memories, resource, memory, offset)
    }

    unsafe fn bind_image_memory(
        &self,
        image: ImageHandle,
        memory: MemoryHandle,
        offset: u64,
    ) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        let HostState {
            memories, images, ..
        } = &mut *state;
        let resource = images
            .get_mut(&image.as_raw())
            .ok_or_else(|| DeviceError::InvalidHandle(format!("image {}", image.as_raw())))?;
        HostState::bind(memories, resource, memory, offset)
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
