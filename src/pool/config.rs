// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pool categories and their block/unit/property configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::device::{BufferUsageFlags, MemoryPropertyFlags};
use crate::error::PoolError;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// Allocation usage class. Each category owns its own list of blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolCategory {
    /// Device-local vertex data
    Vertex,
    /// Device-local index data
    Index,
    /// Host-visible uniform data
    Uniform,
    /// Host-visible staging / transient uploads
    Staging,
    /// Device-local texture images
    Texture,
}

impl PoolCategory {
    pub const COUNT: usize = 5;

    /// Every category, in the order pools are pre-allocated and reported.
    pub const ALL: [PoolCategory; Self::COUNT] = [
        PoolCategory::Vertex,
        PoolCategory::Index,
        PoolCategory::Uniform,
        PoolCategory::Staging,
        PoolCategory::Texture,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PoolCategory::Vertex => "vertex",
            PoolCategory::Index => "index",
            PoolCategory::Uniform => "uniform",
            PoolCategory::Staging => "staging",
            PoolCategory::Texture => "texture",
        }
    }

    /// Pick the category a buffer is pooled in.
    ///
    /// Host-visible requests go to staging; otherwise the first matching
    /// usage bit wins, defaulting to vertex.
    pub fn for_buffer(usage: BufferUsageFlags, properties: MemoryPropertyFlags) -> Self {
        if properties.contains(MemoryPropertyFlags::HOST_VISIBLE) {
            PoolCategory::Staging
        } else if usage.contains(BufferUsageFlags::VERTEX_BUFFER) {
            PoolCategory::Vertex
        } else if usage.contains(BufferUsageFlags::INDEX_BUFFER) {
            PoolCategory::Index
        } else if usage.contains(BufferUsageFlags::UNIFORM_BUFFER) {
            PoolCategory::Uniform
        } else {
            PoolCategory::Vertex
        }
    }
}

impl fmt::Display for PoolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolCategory {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PoolCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PoolError::InvalidConfig(format!("unknown pool category '{}'", s)))
    }
}

/// Block size, unit granularity and memory properties of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Default size of a freshly created block. Larger requests get a larger block.
    pub block_size: u64,
    /// Sub-allocation granularity; every allocation rounds up to a multiple.
    pub allocation_unit: u64,
    /// Properties a memory type must have to back this category.
    pub required_properties: MemoryPropertyFlags,
}

impl PoolConfig {
    pub const fn new(
        block_size: u64,
        allocation_unit: u64,
        required_properties: MemoryPropertyFlags,
    ) -> Self {
        Self {
            block_size,
            allocation_unit,
            required_properties,
        }
    }

    /// Built-in configuration for a category.
    ///
    /// Host-visible categories use 64-byte units to match the
    /// non-coherent-atom size, so partial flushes stay valid.
    pub fn default_for(category: PoolCategory) -> Self {
        let host = MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT;
        match category {
            PoolCategory::Vertex => Self::new(128 * MIB, 4 * KIB, MemoryPropertyFlags::DEVICE_LOCAL),
            PoolCategory::Index => Self::new(64 * MIB, 2 * KIB, MemoryPropertyFlags::DEVICE_LOCAL),
            PoolCategory::Uniform => Self::new(4 * MIB, 64, host),
            PoolCategory::Staging => Self::new(16 * MIB, 64, host),
            PoolCategory::Texture => Self::new(64 * MIB, 4 * KIB, MemoryPropertyFlags::DEVICE_LOCAL),
        }
    }

    pub fn is_host_visible(&self) -> bool {
        self.required_properties
            .contains(MemoryPropertyFlags::HOST_VISIBLE)
    }

    /// Check that the values are coherent enough to build blocks from.
    pub fn validate(&self) -> Result<(), PoolError> {
        self.check().map_err(PoolError::InvalidConfig)
    }

    fn check(&self) -> Result<(), String> {
        if self.allocation_unit == 0 {
            return Err("allocation_unit must be greater than zero".to_string());
        }
        if self.block_size < self.allocation_unit {
            return Err(format!(
                "block_size {} is smaller than allocation_unit {}",
                self.block_size, self.allocation_unit
            ));
        }
        Ok(())
    }
}

/// One optional [`PoolConfig`] per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolConfigRegistry {
    configs: [Option<PoolConfig>; PoolCategory::COUNT],
}

impl PoolConfigRegistry {
    /// Empty registry; every category must be configured before use.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.initialize_defaults();
        registry
    }

    /// Insert or overwrite a category's configuration.
    ///
    /// Existing blocks keep the unit size they were created with.
    pub fn configure(
        &mut self,
        category: PoolCategory,
        block_size: u64,
        allocation_unit: u64,
        required_properties: MemoryPropertyFlags,
    ) {
        self.set(
            category,
            PoolConfig::new(block_size, allocation_unit, required_properties),
        );
    }

    pub fn set(&mut self, category: PoolCategory, config: PoolConfig) {
        self.configs[category.index()] = Some(config);
    }

    /// Install the built-in configuration for all five categories.
    pub fn initialize_defaults(&mut self) {
        for category in PoolCategory::ALL {
            self.set(category, PoolConfig::default_for(category));
        }
    }

    pub fn get(&self, category: PoolCategory) -> Result<&PoolConfig, PoolError> {
        self.configs[category.index()]
            .as_ref()
            .ok_or(PoolError::NotConfigured(category))
    }

    pub fn is_configured(&self, category: PoolCategory) -> bool {
        self.configs[category.index()].is_some()
    }

    /// Configured categories in [`PoolCategory::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolCategory, &PoolConfig)> {
        PoolCategory::ALL
            .into_iter()
            .filter_map(move |c| self.configs[c.index()].as_ref().map(|cfg| (c, cfg)))
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        for (category, config) in self.iter() {
            config
                .check()
                .map_err(|e| PoolError::InvalidConfig(format!("{}: {}", category, e)))?;
        }
        Ok(())
    }
}
