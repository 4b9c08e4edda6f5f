// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Device seam: everything the pool needs from the native GPU API.
//!
//! The pool never talks to a graphics API directly. It enumerates memory
//! types, creates probe buffers, allocates and maps memory and binds
//! resources through [`MemoryDevice`]. The device is assumed to outlive the
//! pool and to accept calls from whichever thread holds the pool lock.

mod flags;
mod host;
mod types;
#[cfg(feature = "vulkan")]
mod vulkan;

pub use flags::{
    BufferUsageFlags, ImageUsageFlags, MemoryAllocateFlags, MemoryPropertyFlags,
    PROBE_BUFFER_USAGE,
};
pub use host::{HostDevice, HostDeviceConfig};
pub use types::{
    BufferDesc, BufferHandle, Format, ImageDesc, ImageHandle, ImageTiling, MappedPtr,
    MemoryHandle, MemoryHeap, MemoryRequirements, MemoryType, SharingMode,
};
#[cfg(feature = "vulkan")]
pub use vulkan::VulkanDevice;

/// Errors reported by a device backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("Out of device memory: requested {requested} bytes from heap {heap}")]
    OutOfDeviceMemory { requested: u64, heap: u32 },

    #[error("Out of host memory")]
    OutOfHostMemory,

    #[error("Memory map failed: {0}")]
    MemoryMapFailed(String),

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Memory type {0} does not exist")]
    InvalidMemoryType(u32),

    #[error("Invalid resource description: {0}")]
    InvalidDescriptor(String),

    #[error("Binding of {size} bytes at offset {offset} exceeds memory size {memory_size}")]
    BindOutOfRange {
        offset: u64,
        size: u64,
        memory_size: u64,
    },

    #[error("Binding offset {offset} is not aligned to {alignment}")]
    Misaligned { offset: u64, alignment: u64 },

    #[error("Vulkan error: {0}")]
    Vulkan(String),
}

impl DeviceError {
    pub fn is_out_of_memory(&self) -> bool {
        matches!(
            self,
            DeviceError::OutOfDeviceMemory { .. } | DeviceError::OutOfHostMemory
        )
    }
}

/// Native device operations consumed by the pool.
///
/// # Safety
///
/// Every method except [`memory_types`](MemoryDevice::memory_types) forwards
/// to the native API and is `unsafe` to call. Callers must:
///
/// - pass only handles returned by this same device that have not been
///   destroyed or freed;
/// - pass descriptors that satisfy the native API's valid-usage rules
///   (non-zero sizes and extents, usage flags the device supports);
/// - not free memory or destroy a resource while it is still bound or mapped
///   and in use.
///
/// [`MemoryPool`](crate::MemoryPool) upholds these for every handle it
/// creates.
pub trait MemoryDevice: Send + Sync {
    /// Memory type table of the physical device, indexed by memory type index.
    fn memory_types(&self) -> &[MemoryType];

    unsafe fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandle, DeviceError>;

    unsafe fn destroy_buffer(&self, buffer: BufferHandle);

    unsafe fn buffer_memory_requirements(
        &self,
        buffer: BufferHandle,
    ) -> Result<MemoryRequirements, DeviceError>;

    unsafe fn create_image(&self, desc: &ImageDesc) -> Result<ImageHandle, DeviceError>;

    unsafe fn destroy_image(&self, image: ImageHandle);

    unsafe fn image_memory_requirements(
        &self,
        image: ImageHandle,
    ) -> Result<MemoryRequirements, DeviceError>;

    unsafe fn allocate_memory(
        &self,
        size: u64,
        memory_type_index: u32,
        flags: MemoryAllocateFlags,
    ) -> Result<MemoryHandle, DeviceError>;

    /// Free a memory object. Any mapping of it becomes invalid.
    unsafe fn free_memory(&self, memory: MemoryHandle);

    /// Map `size` bytes from the start of a host-visible memory object.
    unsafe fn map_memory(&self, memory: MemoryHandle, size: u64) -> Result<MappedPtr, DeviceError>;

    unsafe fn bind_buffer_memory(
        &self,
        buffer: BufferHandle,
        memory: MemoryHandle,
        offset: u64,
    ) -> Result<(), DeviceError>;

    unsafe fn bind_image_memory(
        &self,
        image: ImageHandle,
        memory: MemoryHandle,
        offset: u64,
    ) -> Result<(), DeviceError>;
}
