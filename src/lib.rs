// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pooled GPU memory sub-allocator.
//!
//! [`MemoryPool`] manages device memory blocks per [`PoolCategory`], carves
//! them into fixed-size allocation units tracked by a free list, and hands out
//! buffer/image-backed [`Allocation`]s with alignment and lifetime guarantees.
//!
//! The native device sits behind the [`MemoryDevice`] trait. [`HostDevice`]
//! simulates one in host memory; the `vulkan` feature adds `VulkanDevice`.
//!
//! ```rust
//! use std::sync::Arc;
//! use gpu_mempool::{HostDevice, MemoryPool, PoolCategory};
//!
//! let pool = MemoryPool::with_defaults(Arc::new(HostDevice::default()));
//! let alloc = pool.allocate(PoolCategory::Uniform, 10, 1)?;
//! assert_eq!(alloc.size(), 64);
//! pool.write(&alloc, 0, &[1, 2, 3])?;
//! pool.deallocate(alloc);
//! # Ok::<(), gpu_mempool::PoolError>(())
//! ```

pub mod cli;
pub mod device;
pub mod error;
pub mod logging;
pub mod pool;

pub use device::{
    BufferDesc, BufferHandle, BufferUsageFlags, DeviceError, Format, HostDevice, HostDeviceConfig,
    ImageDesc, ImageHandle, ImageTiling, ImageUsageFlags, MappedPtr, MemoryAllocateFlags,
    MemoryDevice, MemoryHandle, MemoryHeap, MemoryPropertyFlags, MemoryRequirements, MemoryType,
    SharingMode,
};
pub use error::PoolError;
pub use pool::{
    Allocation, BlockId, BlockInfo, BlockKind, CategoryStats, MemoryPool, MemoryUsage,
    PoolCategory, PoolConfig, PoolConfigFile, PoolConfigRegistry, PoolStats,
};

#[cfg(feature = "vulkan")]
pub use device::VulkanDevice;
