// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Flag sets used at the device seam.
//!
//! Bit values match the corresponding Vulkan enums so backends can convert
//! with a raw cast.

use bitflags::bitflags;

bitflags! {
    /// Properties of a physical memory type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemoryPropertyFlags: u32 {
        const DEVICE_LOCAL = 0x0000_0001;
        const HOST_VISIBLE = 0x0000_0002;
        const HOST_COHERENT = 0x0000_0004;
        const HOST_CACHED = 0x0000_0008;
        const LAZILY_ALLOCATED = 0x0000_0010;
        const PROTECTED = 0x0000_0020;
    }
}

bitflags! {
    /// Intended usage of a buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsageFlags: u32 {
        const TRANSFER_SRC = 0x0000_0001;
        const TRANSFER_DST = 0x0000_0002;
        const UNIFORM_TEXEL_BUFFER = 0x0000_0004;
        const STORAGE_TEXEL_BUFFER = 0x0000_0008;
        const UNIFORM_BUFFER = 0x0000_0010;
        const STORAGE_BUFFER = 0x0000_0020;
        const INDEX_BUFFER = 0x0000_0040;
        const VERTEX_BUFFER = 0x0000_0080;
        const INDIRECT_BUFFER = 0x0000_0100;
        const SHADER_DEVICE_ADDRESS = 0x0002_0000;
    }
}

bitflags! {
    /// Intended usage of an image.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageUsageFlags: u32 {
        const TRANSFER_SRC = 0x0000_0001;
        const TRANSFER_DST = 0x0000_0002;
        const SAMPLED = 0x0000_0004;
        const STORAGE = 0x0000_0008;
        const COLOR_ATTACHMENT = 0x0000_0010;
        const DEPTH_STENCIL_ATTACHMENT = 0x0000_0020;
        const TRANSIENT_ATTACHMENT = 0x0000_0040;
        const INPUT_ATTACHMENT = 0x0000_0080;
    }
}

bitflags! {
    /// Extra flags passed when allocating device memory.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemoryAllocateFlags: u32 {
        const DEVICE_MASK = 0x0000_0001;
        const DEVICE_ADDRESS = 0x0000_0002;
    }
}

/// Usage set of the probe buffer used to discover which memory types a
/// pooled block may come from.
pub const PROBE_BUFFER_USAGE: BufferUsageFlags = BufferUsageFlags::VERTEX_BUFFER
    .union(BufferUsageFlags::INDEX_BUFFER)
    .union(BufferUsageFlags::UNIFORM_BUFFER)
    .union(BufferUsageFlags::TRANSFER_SRC)
    .union(BufferUsageFlags::TRANSFER_DST);
