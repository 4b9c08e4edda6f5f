// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Vulkan device backend via `ash`.
//!
//! Wraps an already-created logical device. The caller keeps the instance
//! and device alive for as long as any pool built on this backend.

use std::ptr::NonNull;

use ash::vk::{self, Handle};

use super::flags::{MemoryAllocateFlags, MemoryPropertyFlags};
use super::types::{
    BufferDesc, BufferHandle, Format, ImageDesc, ImageHandle, ImageTiling, MappedPtr,
    MemoryHandle, MemoryRequirements, MemoryType, SharingMode,
};
use super::{DeviceError, MemoryDevice};

/// [`MemoryDevice`] over a Vulkan logical device.
pub struct VulkanDevice {
    device: ash::Device,
    memory_types: Vec<MemoryType>,
}

impl VulkanDevice {
    /// Build the backend, caching the physical device's memory type table.
    ///
    /// # Safety
    ///
    /// `physical_device` must have been enumerated from `instance`, and
    /// `device` must be a live logical device created from it. Both must
    /// outlive this backend and every pool built on it.
    pub unsafe fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
    ) -> Self {
        // SAFETY: the caller guarantees physical_device belongs to instance.
        let props = unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let memory_types = props.memory_types[..props.memory_type_count as usize]
            .iter()
            .map(|t| MemoryType {
                property_flags: MemoryPropertyFlags::from_bits_truncate(t.property_flags.as_raw()),
                heap_index: t.heap_index,
            })
            .collect::<Vec<_>>();

        for (i, t) in memory_types.iter().enumerate() {
            tracing::debug!(
                index = i,
                heap = t.heap_index,
                flags = ?t.property_flags,
                "Vulkan memory type"
            );
        }

        Self {
            device,
            memory_types,
        }
    }

    pub fn raw(&self) -> &ash::Device {
        &self.device
    }
}

fn map_vk(result: vk::Result) -> DeviceError {
    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => DeviceError::OutOfDeviceMemory {
            requested: 0,
            heap: u32::MAX,
        },
        vk::Result::ERROR_OUT_OF_HOST_MEMORY => DeviceError::OutOfHostMemory,
        vk::Result::ERROR_MEMORY_MAP_FAILED => {
            DeviceError::MemoryMapFailed("vkMapMemory failed".to_string())
        }
        other => DeviceError::Vulkan(format!("{:?}", other)),
    }
}

fn vk_format(format: Format) -> vk::Format {
    match format {
        Format::R8Unorm => vk::Format::R8_UNORM,
        Format::R8G8Unorm => vk::Format::R8G8_UNORM,
        Format::R8G8B8A8Unorm => vk::Format::R8G8B8A8_UNORM,
        Format::R8G8B8A8Srgb => vk::Format::R8G8B8A8_SRGB,
        Format::B8G8R8A8Unorm => vk::Format::B8G8R8A8_UNORM,
        Format::B8G8R8A8Srgb => vk::Format::B8G8R8A8_SRGB,
        Format::R16G16B16A16Sfloat => vk::Format::R16G16B16A16_SFLOAT,
        Format::R32Sfloat => vk::Format::R32_SFLOAT,
        Format::R32G32B32A32Sfloat => vk::Format::R32G32B32A32_SFLOAT,
        Format::D32Sfloat => vk::Format::D32_SFLOAT,
        Format::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
    }
}

fn vk_sharing(mode: SharingMode) -> vk::SharingMode {
    match mode {
        SharingMode::Exclusive => vk::SharingMode::EXCLUSIVE,
        SharingMode::Concurrent => vk::SharingMode::CONCURRENT,
    }
}

fn requirements(req: vk::MemoryRequirements) -> MemoryRequirements {
    MemoryRequirements {
        size: req.size,
        alignment: req.alignment,
        memory_type_bits: req.memory_type_bits,
    }
}

impl MemoryDevice for VulkanDevice {
    fn memory_types(&self) -> &[MemoryType] {
        &self.memory_types
    }

    unsafe fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandle, DeviceError> {
        let info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(vk::BufferUsageFlags::from_raw(desc.usage.bits()))
            .sharing_mode(vk_sharing(desc.sharing_mode));
        // SAFETY: info is fully initialised and the caller guarantees it is valid usage.
        let buffer = unsafe { self.device.create_buffer(&info, None) }.map_err(map_vk)?;
        Ok(BufferHandle::from_raw(buffer.as_raw()))
    }

    unsafe fn destroy_buffer(&self, buffer: BufferHandle) {
        // SAFETY: the caller guarantees the handle is live, from this device and unused.
        unsafe {
            self.device
                .destroy_buffer(vk::Buffer::from_raw(buffer.as_raw()), None)
        };
    }

    unsafe fn buffer_memory_requirements(
        &self,
        buffer: BufferHandle,
    ) -> Result<MemoryRequirements, DeviceError> {
        // SAFETY: the caller guarantees the handle is live and from this device.
        let req = unsafe {
            self.device
                .get_buffer_memory_requirements(vk::Buffer::from_raw(buffer.as_raw()))
        };
        Ok(requirements(req))
    }

    unsafe fn create_image(&self, desc: &ImageDesc) -> Result<ImageHandle, DeviceError> {
        let mut info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(vk_format(desc.format))
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(desc.effective_mip_levels())
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(match desc.tiling {
                ImageTiling::Optimal => vk::ImageTiling::OPTIMAL,
                ImageTiling::Linear => vk::ImageTiling::LINEAR,
            })
            .usage(vk::ImageUsageFlags::from_raw(desc.usage.bits()))
            .sharing_mode(vk_sharing(desc.sharing_mode))
            .initial_layout(vk::ImageLayout::UNDEFINED);
        if desc.sharing_mode == SharingMode::Concurrent && !desc.queue_family_indices.is_empty() {
            info = info.queue_family_indices(&desc.queue_family_indices);
        }
        // SAFETY: info and the borrowed queue family slice outlive the call.
        let image = unsafe { self.device.create_image(&info, None) }.map_err(map_vk)?;
        Ok(ImageHandle::from_raw(image.as_raw()))
    }

    unsafe fn destroy_image(&self, image: ImageHandle) {
        // SAFETY: the caller guarantees the handle is live, from this device and unused.
        unsafe {
            self.device
                .destroy_image(vk::Image::from_raw(image.as_raw()), None)
        };
    }

    unsafe fn image_memory_requirements(
        &self,
        image: ImageHandle,
    ) -> Result<MemoryRequirements, DeviceError> {
        // SAFETY: the caller guarantees the handle is live and from this device.
        let req = unsafe {
            self.device
                .get_image_memory_requirements(vk::Image::from_raw(image.as_raw()))
        };
        Ok(requirements(req))
    }

    unsafe fn allocate_memory(
        &self,
        size: u64,
        memory_type_index: u32,
        flags: MemoryAllocateFlags,
    ) -> Result<MemoryHandle, DeviceError> {
        if memory_type_index as usize >= self.memory_types.len() {
            return Err(DeviceError::InvalidMemoryType(memory_type_index));
        }
        let mut flags_info = vk::MemoryAllocateFlagsInfo::default()
            .flags(vk::MemoryAllocateFlags::from_raw(flags.bits()));
        let mut info = vk::MemoryAllocateInfo::default()
            .allocation_size(size)
            .memory_type_index(memory_type_index);
        if !flags.is_empty() {
            info = info.push_next(&mut flags_info);
        }
        // SAFETY: info chain lives on this stack frame for the call.
        let memory = unsafe { self.device.allocate_memory(&info, None) }.map_err(|e| {
            match map_vk(e) {
                DeviceError::OutOfDeviceMemory { .. } => DeviceError::OutOfDeviceMemory {
                    requested: size,
                    heap: self.memory_types[memory_type_index as usize].heap_index,
                },
                other => other,
            }
        })?;
        Ok(MemoryHandle::from_raw(memory.as_raw()))
    }

    unsafe fn free_memory(&self, memory: MemoryHandle) {
        // SAFETY: the caller guarantees the memory is live and no longer in use.
        unsafe {
            self.device
                .free_memory(vk::DeviceMemory::from_raw(memory.as_raw()), None)
        };
    }

    unsafe fn map_memory(&self, memory: MemoryHandle, size: u64) -> Result<MappedPtr, DeviceError> {
        // SAFETY: the caller guarantees the memory is live, host-visible and unmapped.
        let ptr = unsafe {
            self.device.map_memory(
                vk::DeviceMemory::from_raw(memory.as_raw()),
                0,
                size,
                vk::MemoryMapFlags::empty(),
            )
        }
        .map_err(map_vk)?;
        NonNull::new(ptr.cast::<u8>())
            .map(MappedPtr::new)
            .ok_or_else(|| DeviceError::MemoryMapFailed("vkMapMemory returned null".to_string()))
    }

    unsafe fn bind_buffer_memory(
        &self,
        buffer: BufferHandle,
        memory: MemoryHandle,
        offset: u64,
    ) -> Result<(), DeviceError> {
        // SAFETY: the caller guarantees both handles are live and from this device.
        unsafe {
            self.device.bind_buffer_memory(
                vk::Buffer::from_raw(buffer.as_raw()),
                vk::DeviceMemory::from_raw(memory.as_raw()),
                offset,
            )
        }
        .map_err(map_vk)
    }

    unsafe fn bind_image_memory(
        &self,
        image: ImageHandle,
        memory: MemoryHandle,
        offset: u64,
    ) -> Result<(), DeviceError> {
        // SAFETY: the caller guarantees both handles are live and from this device.
        unsafe {
            self.device.bind_image_memory(
                vk::Image::from_raw(image.as_raw()),
                vk::DeviceMemory::from_raw(memory.as_raw()),
                offset,
            )
        }
        .map_err(map_vk)
    }
}
