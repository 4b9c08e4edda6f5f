// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Memory pool: configuration, blocks, placement and the public API.

mod block;
mod config;
mod config_file;
mod manager;
mod placement;
mod resources;
mod telemetry;
mod types;

pub use config::{PoolCategory, PoolConfig, PoolConfigRegistry};
pub use config_file::{load_with_defaults, MemoryProperty, PoolConfigFile, PoolEntry};
pub use manager::MemoryPool;
pub use placement::{align_up, find_free_run};
pub use types::{
    Allocation, BlockId, BlockInfo, BlockKind, CategoryStats, MemoryUsage, PoolStats,
};
