// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Formatting helpers for pool tables and statistics.

use crate::device::MemoryPropertyFlags;
use crate::pool::{PoolConfigRegistry, PoolStats};

/// Print the configuration of every configured category.
pub fn print_config_table(registry: &PoolConfigRegistry) {
    println!("  Category   | Block Size | Unit     | Properties");
    println!("  -----------+------------+----------+---------------------------");
    for (category, config) in registry.iter() {
        println!(
            "  {:10} | {:>10} | {:>8} | {}",
            category.as_str(),
            format_bytes(config.block_size),
            format_bytes(config.allocation_unit),
            format_properties(config.required_properties)
        );
    }
}

/// Print pool statistics in human-readable format.
pub fn print_stats_human(stats: &PoolStats) {
    println!("====================================================");
    println!(
        "  GPU Memory Pool                         v{}",
        env!("CARGO_PKG_VERSION")
    );
    println!("====================================================");
    println!(
        "  Used: {} / {} ({})   Rendering: {}",
        format_bytes(stats.total.used),
        format_bytes(stats.total.total),
        format_percent(stats.total.utilization()),
        if stats.rendering_active { "active" } else { "idle" }
    );
    println!("====================================================");

    println!("\nCategories");
    println!("  Category   | Blocks  | Used       | Total      | Util   | Largest Free");
    println!("  -----------+---------+------------+------------+--------+-------------");
    for cat in &stats.categories {
        if !cat.configured {
            println!("  {:10} | (not configured)", cat.category.as_str());
            continue;
        }
        println!(
            "  {:10} | {:>3}+{:<3} | {:>10} | {:>10} | {:>6} | {:>12}",
            cat.category.as_str(),
            cat.pooled_blocks,
            cat.dedicated_blocks,
            format_bytes(cat.usage.used),
            format_bytes(cat.usage.total),
            format_percent(cat.usage.utilization()),
            format_bytes(cat.largest_free_run_bytes)
        );
    }
}

/// Property flags as `host_visible|host_coherent`, or `none`.
pub fn format_properties(flags: MemoryPropertyFlags) -> String {
    if flags.is_empty() {
        return "none".to_string();
    }
    flags
        .iter_names()
        .map(|(name, _)| name.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("|")
}

/// Format a ratio as a percentage with one decimal.
pub fn format_percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Format bytes in human-readable form.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
#[path = "status_format_tests.rs"]
mod tests;
