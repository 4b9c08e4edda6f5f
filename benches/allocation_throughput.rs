// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Allocation throughput benchmarks.
//!
//! Measures allocate/deallocate cycles on a warm pool, placement on a
//! fragmented block, and the raw free-run scan.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use gpu_mempool::pool::find_free_run;
use gpu_mempool::{HostDevice, MemoryPool, PoolCategory};

fn bench_allocate_deallocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_deallocate");
    for size in [64u64, 1024, 16 * 1024] {
        let pool = MemoryPool::with_defaults(Arc::new(HostDevice::default()));
        pool.pre_allocate_pools().expect("pre-allocation");
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let alloc = pool
                    .allocate(PoolCategory::Uniform, black_box(size), 64)
                    .expect("allocate");
                pool.deallocate(alloc);
            });
        });
    }
    group.finish();
}

fn bench_fragmented_placement(c: &mut Criterion) {
    let pool = MemoryPool::with_defaults(Arc::new(HostDevice::default()));
    // Free every other unit in the first 16K units of the uniform block.
    let allocations: Vec<_> = (0..16_384)
        .map(|_| pool.allocate(PoolCategory::Uniform, 64, 1).expect("allocate"))
        .collect();
    let mut held = Vec::new();
    for (i, alloc) in allocations.into_iter().enumerate() {
        if i % 2 == 0 {
            held.push(alloc);
        } else {
            pool.deallocate(alloc);
        }
    }
    // A 128-byte request must scan past the single-unit holes.
    c.bench_function("fragmented_placement", |b| {
        b.iter(|| {
            let alloc = pool
                .allocate(PoolCategory::Uniform, black_box(128), 1)
                .expect("allocate");
            pool.deallocate(alloc);
        });
    });
    drop(held);
}

fn bench_find_free_run(c: &mut Criterion) {
    let mut free = vec![true; 65_536];
    for (i, slot) in free.iter_mut().enumerate() {
        if i % 3 == 0 {
            *slot = false;
        }
    }
    let len = free.len();
    free[len - 8..].fill(true);

    c.bench_function("find_free_run_65536_units", |b| {
        b.iter(|| find_free_run(black_box(&free), 64, 4, 256));
    });
}

criterion_group!(
    benches,
    bench_allocate_deallocate,
    bench_fragmented_placement,
    bench_find_free_run
);
criterion_main!(benches);
