// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error type shared by every pool operation.
//!
//! Configuration errors indicate a mistake in the calling engine; device
//! errors are runtime resource conditions the caller may branch on.

use crate::device::{DeviceError, MemoryPropertyFlags};
use crate::pool::PoolCategory;

/// Errors for memory pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Pool type not configured: {0}")]
    NotConfigured(PoolCategory),

    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("No suitable memory type for type bits {type_bits:#b} with properties {properties:?}")]
    NoSuitableMemoryType {
        type_bits: u32,
        properties: MemoryPropertyFlags,
    },

    #[error("Invalid memory type index {index} (device exposes {count} types)")]
    InvalidMemoryTypeIndex { index: u32, count: usize },

    #[error("Invalid allocation request: {0}")]
    InvalidRequest(String),

    #[error("Failed to allocate memory from pool: {0}")]
    PoolAllocationFailed(#[source] Box<PoolError>),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Allocation does not belong to this pool")]
    UnknownAllocation,

    #[error("Allocation is not host-mapped")]
    NotMapped,

    #[error("Access of {len} bytes at offset {offset} exceeds allocation size {size}")]
    OutOfBounds { offset: u64, len: u64, size: u64 },
}

impl PoolError {
    /// True for errors caused by missing or incoherent pool configuration.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            PoolError::NotConfigured(_) | PoolError::InvalidConfig(_) => true,
            PoolError::PoolAllocationFailed(inner) => inner.is_configuration_error(),
            _ => false,
        }
    }

    /// True when the device ran out of memory while creating a block.
    pub fn is_out_of_memory(&self) -> bool {
        match self {
            PoolError::Device(e) => e.is_out_of_memory(),
            PoolError::PoolAllocationFailed(inner) => inner.is_out_of_memory(),
            _ => false,
        }
    }
}
