// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Handles, descriptors and memory-type records exchanged with a device.

use std::ptr::NonNull;

use super::flags::{BufferUsageFlags, ImageUsageFlags, MemoryPropertyFlags};

macro_rules! raw_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u64);

        impl $name {
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn as_raw(self) -> u64 {
                self.0
            }
        }
    };
}

raw_handle!(
    /// Native device memory object.
    MemoryHandle
);
raw_handle!(
    /// Native buffer object.
    BufferHandle
);
raw_handle!(
    /// Native image object.
    ImageHandle
);

/// One entry of the physical device's memory type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    pub property_flags: MemoryPropertyFlags,
    pub heap_index: u32,
}

/// One physical memory heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryHeap {
    pub size: u64,
}

/// Size, alignment and compatible memory types of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequirements {
    pub size: u64,
    pub alignment: u64,
    pub memory_type_bits: u32,
}

/// Queue sharing mode of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SharingMode {
    #[default]
    Exclusive,
    Concurrent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageTiling {
    #[default]
    Optimal,
    Linear,
}

/// Texel formats understood by the pool's image path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    R8Unorm,
    R8G8Unorm,
    R8G8B8A8Unorm,
    R8G8B8A8Srgb,
    B8G8R8A8Unorm,
    B8G8R8A8Srgb,
    R16G16B16A16Sfloat,
    R32Sfloat,
    R32G32B32A32Sfloat,
    D32Sfloat,
    D24UnormS8Uint,
}

impl Format {
    pub fn bytes_per_texel(self) -> u64 {
        match self {
            Format::R8Unorm => 1,
            Format::R8G8Unorm => 2,
            Format::R8G8B8A8Unorm
            | Format::R8G8B8A8Srgb
            | Format::B8G8R8A8Unorm
            | Format::B8G8R8A8Srgb
            | Format::R32Sfloat
            | Format::D32Sfloat
            | Format::D24UnormS8Uint => 4,
            Format::R16G16B16A16Sfloat => 8,
            Format::R32G32B32A32Sfloat => 16,
        }
    }
}

/// Buffer creation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    pub size: u64,
    pub usage: BufferUsageFlags,
    pub sharing_mode: SharingMode,
}

impl BufferDesc {
    pub fn new(size: u64, usage: BufferUsageFlags) -> Self {
        Self {
            size,
            usage,
            sharing_mode: SharingMode::Exclusive,
        }
    }
}

/// 2D image creation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub tiling: ImageTiling,
    pub usage: ImageUsageFlags,
    pub mip_levels: u32,
    pub sharing_mode: SharingMode,
    /// Only consulted for [`SharingMode::Concurrent`].
    pub queue_family_indices: Vec<u32>,
}

impl ImageDesc {
    pub fn new_2d(width: u32, height: u32, format: Format) -> Self {
        Self {
            width,
            height,
            format,
            tiling: ImageTiling::Optimal,
            usage: ImageUsageFlags::SAMPLED | ImageUsageFlags::TRANSFER_DST,
            mip_levels: 1,
            sharing_mode: SharingMode::Exclusive,
            queue_family_indices: Vec::new(),
        }
    }

    pub fn with_usage(mut self, usage: ImageUsageFlags) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_tiling(mut self, tiling: ImageTiling) -> Self {
        self.tiling = tiling;
        self
    }

    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    pub fn with_concurrent_sharing(mut self, queue_family_indices: Vec<u32>) -> Self {
        self.sharing_mode = SharingMode::Concurrent;
        self.queue_family_indices = queue_family_indices;
        self
    }

    /// Mip count actually used for creation (never below one).
    pub fn effective_mip_levels(&self) -> u32 {
        self.mip_levels.max(1)
    }

    /// Length of the full mip chain for this extent.
    pub fn max_mip_levels(&self) -> u32 {
        u32::BITS - self.width.max(self.height).leading_zeros()
    }
}

/// Persistent host mapping of a device memory object.
///
/// The pointer stays valid until the memory object it was mapped from is
/// freed; the pool only frees memory when it is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedPtr(NonNull<u8>);

// SAFETY: a mapping is plain memory addressable from any thread; the pool
// hands out disjoint ranges so concurrent writers never alias.
unsafe impl Send for MappedPtr {}
unsafe impl Sync for MappedPtr {}

impl MappedPtr {
    pub fn new(ptr: NonNull<u8>) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    /// Pointer `offset` bytes past this one.
    ///
    /// # Safety
    /// `offset` must stay within the mapped range.
    pub unsafe fn add(self, offset: u64) -> Self {
        // SAFETY: in-bounds offset of a non-null mapping is non-null.
        Self(NonNull::new_unchecked(self.0.as_ptr().add(offset as usize)))
    }
}
