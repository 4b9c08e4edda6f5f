// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pool gauges and counters published through the `metrics` facade.
//!
//! Without an installed recorder these calls are no-ops.

use super::config::PoolCategory;
use super::types::{BlockKind, MemoryUsage};

pub(crate) const USED_BYTES: &str = "gpu_mempool_used_bytes";
pub(crate) const TOTAL_BYTES: &str = "gpu_mempool_total_bytes";
pub(crate) const BLOCKS_CREATED: &str = "gpu_mempool_blocks_created_total";

pub(crate) fn record_usage(category: PoolCategory, usage: MemoryUsage) {
    metrics::gauge!(USED_BYTES, "category" => category.as_str()).set(usage.used as f64);
    metrics::gauge!(TOTAL_BYTES, "category" => category.as_str()).set(usage.total as f64);
}

pub(crate) fn record_block_created(category: PoolCategory, kind: BlockKind) {
    let kind = match kind {
        BlockKind::Pooled => "pooled",
        BlockKind::Dedicated => "dedicated",
    };
    metrics::counter!(BLOCKS_CREATED, "category" => category.as_str(), "kind" => kind).increment(1);
}
