// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! TOML pool configuration files.
//!
//! ```toml
//! [pools.uniform]
//! block_size = 4194304
//! allocation_unit = 64
//! properties = ["host_visible", "host_coherent"]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::config::{PoolCategory, PoolConfig, PoolConfigRegistry};
use crate::device::MemoryPropertyFlags;
use crate::error::PoolError;

/// Memory property names accepted in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryProperty {
    DeviceLocal,
    HostVisible,
    HostCoherent,
    HostCached,
    LazilyAllocated,
    Protected,
}

impl MemoryProperty {
    const ALL: [MemoryProperty; 6] = [
        MemoryProperty::DeviceLocal,
        MemoryProperty::HostVisible,
        MemoryProperty::HostCoherent,
        MemoryProperty::HostCached,
        MemoryProperty::LazilyAllocated,
        MemoryProperty::Protected,
    ];

    fn flag(self) -> MemoryPropertyFlags {
        match self {
            MemoryProperty::DeviceLocal => MemoryPropertyFlags::DEVICE_LOCAL,
            MemoryProperty::HostVisible => MemoryPropertyFlags::HOST_VISIBLE,
            MemoryProperty::HostCoherent => MemoryPropertyFlags::HOST_COHERENT,
            MemoryProperty::HostCached => MemoryPropertyFlags::HOST_CACHED,
            MemoryProperty::LazilyAllocated => MemoryPropertyFlags::LAZILY_ALLOCATED,
            MemoryProperty::Protected => MemoryPropertyFlags::PROTECTED,
        }
    }
}

/// One `[pools.<category>]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolEntry {
    pub block_size: u64,
    pub allocation_unit: u64,
    #[serde(default)]
    pub properties: Vec<MemoryProperty>,
}

impl PoolEntry {
    fn to_config(&self) -> PoolConfig {
        let properties = self
            .properties
            .iter()
            .fold(MemoryPropertyFlags::empty(), |acc, p| acc | p.flag());
        PoolConfig::new(self.block_size, self.allocation_unit, properties)
    }

    fn from_config(config: &PoolConfig) -> Self {
        Self {
            block_size: config.block_size,
            allocation_unit: config.allocation_unit,
            properties: MemoryProperty::ALL
                .into_iter()
                .filter(|p| config.required_properties.contains(p.flag()))
                .collect(),
        }
    }
}

/// Parsed pool configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfigFile {
    #[serde(default)]
    pub pools: BTreeMap<String, PoolEntry>,
}

impl PoolConfigFile {
    pub fn parse(contents: &str) -> Result<Self, PoolError> {
        toml::from_str(contents).map_err(|e| PoolError::InvalidConfig(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PoolError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PoolError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&contents)
    }

    pub fn from_registry(registry: &PoolConfigRegistry) -> Self {
        Self {
            pools: registry
                .iter()
                .map(|(category, config)| (category.to_string(), PoolEntry::from_config(config)))
                .collect(),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, PoolError> {
        toml::to_string_pretty(self).map_err(|e| PoolError::InvalidConfig(e.to_string()))
    }

    /// Overlay every entry onto `registry`, validating each one.
    pub fn apply_to(&self, registry: &mut PoolConfigRegistry) -> Result<(), PoolError> {
        for (name, entry) in &self.pools {
            let category: PoolCategory = name.parse()?;
            let config = entry.to_config();
            config.validate().map_err(|e| {
                let reason = match e {
                    PoolError::InvalidConfig(reason) => reason,
                    other => other.to_string(),
                };
                PoolError::InvalidConfig(format!("[pools.{}] {}", name, reason))
            })?;
            registry.set(category, config);
        }
        Ok(())
    }

    /// Registry holding only the categories named in the file.
    pub fn into_registry(self) -> Result<PoolConfigRegistry, PoolError> {
        let mut registry = PoolConfigRegistry::new();
        self.apply_to(&mut registry)?;
        Ok(registry)
    }
}

/// Load a config file on top of the built-in defaults.
pub fn load_with_defaults(path: impl AsRef<Path>) -> Result<PoolConfigRegistry, PoolError> {
    let file = PoolConfigFile::load(path)?;
    let mut registry = PoolConfigRegistry::with_defaults();
    file.apply_to(&mut registry)?;
    tracing::debug!(pools = file.pools.len(), "Loaded pool configuration file");
    Ok(registry)
}
