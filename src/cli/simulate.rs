// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! `simulate` command: drive a synthetic renderer workload through a pool
//! backed by [`HostDevice`] and report the resulting statistics.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::status_format::print_stats_human;
use super::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_SUCCESS};
use crate::device::{
    BufferUsageFlags, Format, HostDevice, ImageDesc, MemoryDevice, MemoryPropertyFlags,
};
use crate::error::PoolError;
use crate::pool::{load_with_defaults, MemoryPool, PoolCategory, PoolConfigRegistry, PoolStats};

const CATEGORIES: [PoolCategory; 4] = [
    PoolCategory::Vertex,
    PoolCategory::Index,
    PoolCategory::Uniform,
    PoolCategory::Staging,
];
const ALIGNMENTS: [u64; 3] = [1, 64, 256];
/// Largest accepted `--size`.
pub const MAX_SIZE: u64 = 1 << 30;

/// Parsed `simulate` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulateOptions {
    pub config: Option<PathBuf>,
    pub allocations: usize,
    pub size: u64,
    pub pre_allocate: bool,
    pub json: bool,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            config: None,
            allocations: 256,
            size: 4096,
            pre_allocate: false,
            json: false,
        }
    }
}

impl SimulateOptions {
    /// Parse the arguments following `simulate`.
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut options = Self::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => {
                    let value = iter.next().ok_or("--config requires a file path")?;
                    options.config = Some(PathBuf::from(value));
                }
                "--allocations" => {
                    let value = iter.next().ok_or("--allocations requires a number")?;
                    options.allocations = value
                        .parse()
                        .map_err(|_| format!("invalid allocation count '{}'", value))?;
                }
                "--size" => {
                    let value = iter.next().ok_or("--size requires a byte count")?;
                    options.size = value
                        .parse()
                        .ok()
                        .filter(|size| (1..=MAX_SIZE).contains(size))
                        .ok_or_else(|| {
                            format!("invalid size '{}' (1 to {} bytes)", value, MAX_SIZE)
                        })?;
                }
                "--pre-allocate" => options.pre_allocate = true,
                "--json" => options.json = true,
                other => return Err(format!("unknown option '{}'", other)),
            }
        }
        Ok(options)
    }
}

/// Outcome of a simulated workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub allocations: usize,
    pub deallocations: usize,
    pub failures: usize,
    pub buffers: usize,
    pub images: usize,
    pub pre_allocated_blocks: usize,
    pub elapsed_micros: u64,
    pub stats: PoolStats,
}

/// Run the workload against `pool`.
///
/// Requests rotate through the buffer categories with growing sizes and
/// mixed alignments; every third step releases the oldest live allocation.
/// A few textures and one device-address buffer exercise the dedicated path.
pub fn run_workload<D: MemoryDevice + ?Sized>(
    pool: &MemoryPool<D>,
    options: &SimulateOptions,
) -> Result<SimulationReport, PoolError> {
    let started = Instant::now();
    let pre_allocated_blocks = if options.pre_allocate {
        pool.pre_allocate_pools()?
    } else {
        0
    };
    pool.set_rendering_active(true);

    let mut live = VecDeque::new();
    let (mut allocations, mut deallocations, mut failures) = (0, 0, 0);
    for i in 0..options.allocations {
        let category = CATEGORIES[i % CATEGORIES.len()];
        let alignment = ALIGNMENTS[i % ALIGNMENTS.len()];
        let Some(size) = options.size.checked_mul(1 + (i % 7) as u64) else {
            tracing::warn!(%category, base = options.size, "Simulated allocation size overflows");
            failures += 1;
            continue;
        };
        match pool.allocate(category, size, alignment) {
            Ok(allocation) => {
                allocations += 1;
                live.push_back(allocation);
            }
            Err(e) if e.is_configuration_error() => return Err(e),
            Err(e) => {
                tracing::warn!(%category, size, error = %e, "Simulated allocation failed");
                failures += 1;
            }
        }
        if i % 3 == 2 {
            if let Some(oldest) = live.pop_front() {
                pool.deallocate(oldest);
                deallocations += 1;
            }
        }
    }

    let mut buffers = Vec::new();
    let (buffer, allocation) = pool.create_buffer(
        options.size,
        BufferUsageFlags::VERTEX_BUFFER | BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        MemoryPropertyFlags::DEVICE_LOCAL,
    )?;
    buffers.push((buffer, allocation));
    let (buffer, allocation) = pool.create_buffer(
        options.size,
        BufferUsageFlags::UNIFORM_BUFFER,
        MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
    )?;
    buffers.push((buffer, allocation));

    let mut images = Vec::new();
    for extent in [256u32, 512, 1024] {
        let desc = ImageDesc::new_2d(extent, extent, Format::R8G8B8A8Unorm).with_mip_levels(4);
        images.push(pool.create_image(&desc, MemoryPropertyFlags::DEVICE_LOCAL)?);
    }

    pool.set_rendering_active(false);
    let stats = pool.stats();
    let report = SimulationReport {
        allocations,
        deallocations,
        failures,
        buffers: buffers.len(),
        images: images.len(),
        pre_allocated_blocks,
        elapsed_micros: started.elapsed().as_micros() as u64,
        stats,
    };

    for (buffer, allocation) in buffers {
        pool.destroy_buffer(buffer, allocation);
    }
    for (image, allocation) in images {
        pool.destroy_image(image, allocation);
    }
    for allocation in live {
        pool.deallocate(allocation);
    }
    Ok(report)
}

fn load_registry(options: &SimulateOptions) -> Result<PoolConfigRegistry, PoolError> {
    match &options.config {
        Some(path) => load_with_defaults(path),
        None => Ok(PoolConfigRegistry::with_defaults()),
    }
}

/// Entry point of the `simulate` command.
pub fn run_simulate(args: &[String]) -> i32 {
    let options = match SimulateOptions::parse(args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_CONFIG_ERROR;
        }
    };
    let registry = match load_registry(&options) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_CONFIG_ERROR;
        }
    };

    let pool = MemoryPool::with_registry(Arc::new(HostDevice::default()), registry);
    let report = match run_workload(&pool, &options) {
        Ok(report) => report,
        Err(e) if e.is_configuration_error() => {
            eprintln!("Error: {}", e);
            return EXIT_CONFIG_ERROR;
        }
        Err(e) => {
            eprintln!("Simulation failed: {}", e);
            return EXIT_FAILURE;
        }
    };

    if options.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return EXIT_FAILURE;
            }
        }
    } else {
        print_stats_human(&report.stats);
        println!(
            "\nWorkload: {} allocations, {} deallocations, {} failures, {} buffers, {} images in {} us",
            report.allocations,
            report.deallocations,
            report.failures,
            report.buffers,
            report.images,
            report.elapsed_micros
        );
    }
    EXIT_SUCCESS
}

#[cfg(test)]
#[path = "simulate_tests.rs"]
mod tests;
