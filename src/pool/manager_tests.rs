//! Tests for the memory pool: allocation, deallocation, accounting and
//! block lifetime.

use super::*;
use crate::device::{
    BufferUsageFlags, HostDevice, HostDeviceConfig, MemoryHandle, MemoryPropertyFlags,
};

const MIB: u64 = 1024 * 1024;

fn uniform_pool() -> MemoryPool<HostDevice> {
    let pool = MemoryPool::new(Arc::new(HostDevice::default()));
    pool.configure(
        PoolCategory::Uniform,
        4096,
        64,
        MemoryPropertyFlags::HOST_VISIBLE,
    );
    pool
}

fn free_lists(pool: &MemoryPool<HostDevice>) -> Vec<Vec<bool>> {
    pool.state
        .lock()
        .blocks
        .iter()
        .flatten()
        .map(|b| b.free_list.clone())
        .collect()
}

#[test]
fn test_small_request_rounds_up_to_one_unit() {
    let pool = uniform_pool();
    let alloc = pool.allocate(PoolCategory::Uniform, 10, 1).unwrap();
    assert_eq!(alloc.offset(), 0);
    assert_eq!(alloc.size(), 64);
    assert!(alloc.is_mapped());
    assert!(alloc.mapped_ptr().is_some());
    assert_eq!(alloc.block(), BlockId { category: PoolCategory::Uniform, index: 0 });
}

#[test]
fn test_full_block_triggers_second_block() {
    let pool = uniform_pool();
    let mut allocations = Vec::new();
    for i in 0..64u64 {
        let alloc = pool.allocate(PoolCategory::Uniform, 64, 1).unwrap();
        assert_eq!(alloc.block().index, 0);
        assert_eq!(alloc.offset(), i * 64);
        allocations.push(alloc);
    }
    assert_eq!(pool.block_count(PoolCategory::Uniform), 1);

    let overflow = pool.allocate(PoolCategory::Uniform, 64, 1).unwrap();
    assert_eq!(overflow.block().index, 1);
    assert_eq!(overflow.offset(), 0);
    assert_eq!(pool.block_count(PoolCategory::Uniform), 2);
    assert_eq!(pool.memory_usage(PoolCategory::Uniform).total, 8192);
}

#[test]
fn test_alignment_larger_than_unit() {
    let pool = uniform_pool();
    let first = pool.allocate(PoolCategory::Uniform, 10, 1).unwrap();
    assert_eq!(first.offset(), 0);

    let aligned = pool.allocate(PoolCategory::Uniform, 100, 256).unwrap();
    assert_eq!(aligned.offset(), 256);
    assert_eq!(aligned.size(), 256);
}

#[test]
fn test_freed_range_is_reused_first() {
    let pool = uniform_pool();
    let a = pool.allocate(PoolCategory::Uniform, 64, 1).unwrap();
    let b = pool.allocate(PoolCategory::Uniform, 64, 1).unwrap();
    let (a_block, a_offset) = (a.block(), a.offset());
    assert_eq!(b.offset(), 64);

    pool.deallocate(a);
    let c = pool.allocate(PoolCategory::Uniform, 64, 1).unwrap();
    assert_eq!(c.block(), a_block);
    assert_eq!(c.offset(), a_offset);
}

#[test]
fn test_foreign_allocation_is_ignored() {
    let pool = uniform_pool();
    let _kept = pool.allocate(PoolCategory::Uniform, 128, 1).unwrap();
    let before = free_lists(&pool);

    let foreign = Allocation {
        memory: MemoryHandle::from_raw(0xdead),
        offset: 0,
        size: 128,
        memory_type_index: 1,
        mapped_ptr: None,
        block: BlockId {
            category: PoolCategory::Uniform,
            index: 0,
        },
    };
    assert!(!pool.state.lock().deallocate(foreign));
    assert_eq!(free_lists(&pool), before);
    assert_eq!(pool.memory_usage(PoolCategory::Uniform).used, 128);
}

#[test]
fn test_stale_block_id_falls_back_to_handle_lookup() {
    let pool = uniform_pool();
    let mut alloc = pool.allocate(PoolCategory::Uniform, 64, 1).unwrap();
    alloc.block.index = 7;
    assert!(pool.state.lock().deallocate(alloc));
    assert_eq!(pool.memory_usage(PoolCategory::Uniform).used, 0);
}

#[test]
fn test_usage_counts_whole_units() {
    let pool = uniform_pool();
    let allocations: Vec<Allocation> = (0..10)
        .map(|_| pool.allocate(PoolCategory::Uniform, 100, 1).unwrap())
        .collect();
    assert_eq!(pool.memory_usage(PoolCategory::Uniform).used, 10 * 128);

    for alloc in allocations {
        pool.deallocate(alloc);
    }
    let usage = pool.memory_usage(PoolCategory::Uniform);
    assert_eq!(usage.used, 0);
    assert_eq!(usage.total, 4096);
}

#[test]
fn test_zero_size_request_rejected() {
    let pool = uniform_pool();
    let err = pool.allocate(PoolCategory::Uniform, 0, 1).unwrap_err();
    assert!(matches!(err, PoolError::InvalidRequest(_)));
    assert_eq!(pool.block_count(PoolCategory::Uniform), 0);
}

#[test]
fn test_zero_alignment_treated_as_one() {
    let pool = uniform_pool();
    let alloc = pool.allocate(PoolCategory::Uniform, 10, 0).unwrap();
    assert_eq!(alloc.offset(), 0);
}

#[test]
fn test_unconfigured_category() {
    let pool = uniform_pool();
    let err = pool.allocate(PoolCategory::Vertex, 64, 1).unwrap_err();
    assert!(matches!(err, PoolError::NotConfigured(PoolCategory::Vertex)));
    assert!(err.is_configuration_error());
}

#[test]
fn test_unsatisfiable_properties() {
    let pool = MemoryPool::new(Arc::new(HostDevice::default()));
    pool.configure(
        PoolCategory::Uniform,
        4096,
        64,
        MemoryPropertyFlags::DEVICE_LOCAL | MemoryPropertyFlags::HOST_VISIBLE,
    );
    let err = pool.allocate(PoolCategory::Uniform, 64, 1).unwrap_err();
    assert!(matches!(err, PoolError::NoSuitableMemoryType { .. }));
    assert_eq!(pool.block_count(PoolCategory::Uniform), 0);
}

#[test]
fn test_out_of_memory_leaves_pool_usable() {
    let device = Arc::new(HostDevice::new(HostDeviceConfig::with_heap_sizes(
        8192, 8192,
    )));
    let pool = MemoryPool::new(device);
    pool.configure(
        PoolCategory::Staging,
        4096,
        64,
        MemoryPropertyFlags::HOST_VISIBLE,
    );

    let a = pool.allocate(PoolCategory::Staging, 4096, 1).unwrap();
    let b = pool.allocate(PoolCategory::Staging, 4096, 1).unwrap();
    let err = pool.allocate(PoolCategory::Staging, 64, 1).unwrap_err();
    assert!(err.is_out_of_memory());
    assert_eq!(pool.block_count(PoolCategory::Staging), 2);

    pool.deallocate(a);
    let c = pool.allocate(PoolCategory::Staging, 64, 1).unwrap();
    assert_eq!(c.block().index, 0);
    pool.deallocate(b);
    pool.deallocate(c);
}

#[test]
fn test_oversized_request_gets_larger_block() {
    let pool = uniform_pool();
    let big = pool.allocate(PoolCategory::Uniform, 10_000, 1).unwrap();
    assert_eq!(big.offset(), 0);
    let info = pool.block_info(big.block()).unwrap();
    assert!(info.size >= 10_000);
    assert_eq!(info.size % 64, 0);
}

#[test]
fn test_reconfigure_keeps_existing_block_unit() {
    let pool = uniform_pool();
    let first = pool.allocate(PoolCategory::Uniform, 10, 1).unwrap();
    pool.configure(
        PoolCategory::Uniform,
        8192,
        256,
        MemoryPropertyFlags::HOST_VISIBLE,
    );

    let second = pool.allocate(PoolCategory::Uniform, 10, 1).unwrap();
    assert_eq!(second.block(), first.block());
    assert_eq!(second.size(), 64);
    assert_eq!(pool.block_info(first.block()).unwrap().allocation_unit, 64);
    assert_eq!(pool.config(PoolCategory::Uniform).unwrap().allocation_unit, 256);
}

#[test]
fn test_device_local_allocations_are_not_mapped() {
    let pool = MemoryPool::with_defaults(Arc::new(HostDevice::default()));
    let alloc = pool.allocate(PoolCategory::Vertex, 1000, 16).unwrap();
    assert!(!alloc.is_mapped());
    assert!(alloc.mapped_ptr().is_none());
    assert!(matches!(pool.write(&alloc, 0, &[1]), Err(PoolError::NotMapped)));
}

#[test]
fn test_mapped_ranges_are_independent() {
    let pool = uniform_pool();
    let a = pool.allocate(PoolCategory::Uniform, 64, 1).unwrap();
    let b = pool.allocate(PoolCategory::Uniform, 64, 1).unwrap();

    pool.write(&a, 0, &[0xaa; 64]).unwrap();
    pool.write(&b, 0, &[0x55; 64]).unwrap();

    let mut out = [0u8; 64];
    pool.read(&a, 0, &mut out).unwrap();
    assert!(out.iter().all(|byte| *byte == 0xaa));
    pool.read(&b, 0, &mut out).unwrap();
    assert!(out.iter().all(|byte| *byte == 0x55));

    assert!(matches!(
        pool.write(&a, 60, &[0; 8]),
        Err(PoolError::OutOfBounds { offset: 60, len: 8, size: 64 })
    ));
    assert!(matches!(
        pool.read(&a, u64::MAX, &mut out),
        Err(PoolError::OutOfBounds { .. })
    ));
}

#[test]
fn test_write_through_other_pool_after_drop_is_rejected() {
    let device = Arc::new(HostDevice::default());
    let first = MemoryPool::new(device.clone());
    first.configure(PoolCategory::Uniform, 4 * MIB, 256, MemoryPropertyFlags::HOST_VISIBLE);
    let stale = first.allocate(PoolCategory::Uniform, 64, 1).unwrap();
    drop(first);
    assert_eq!(device.live_memory_objects(), 0);

    let second = MemoryPool::new(device.clone());
    second.configure(PoolCategory::Uniform, 4 * MIB, 256, MemoryPropertyFlags::HOST_VISIBLE);
    let live = second.allocate(PoolCategory::Uniform, 64, 1).unwrap();
    second.write(&live, 0, &[0x11; 4]).unwrap();

    assert!(matches!(
        second.write(&stale, 0, &[0xab; 4]),
        Err(PoolError::UnknownAllocation)
    ));
    let mut out = [0u8; 4];
    assert!(matches!(
        second.read(&stale, 0, &mut out),
        Err(PoolError::UnknownAllocation)
    ));
    second.read(&live, 0, &mut out).unwrap();
    assert_eq!(out, [0x11; 4]);
}

#[test]
fn test_range_outside_owning_block_is_rejected() {
    let pool = uniform_pool();
    let mut alloc = pool.allocate(PoolCategory::Uniform, 64, 1).unwrap();
    alloc.offset = 4096;
    assert!(matches!(
        pool.write(&alloc, 0, &[1]),
        Err(PoolError::UnknownAllocation)
    ));
    alloc.offset = 0;
    alloc.size = u64::MAX;
    assert!(matches!(
        pool.write(&alloc, 0, &[1]),
        Err(PoolError::UnknownAllocation)
    ));
}

#[test]
fn test_pre_allocate_creates_one_block_per_category() {
    let device = Arc::new(HostDevice::default());
    let pool = MemoryPool::with_defaults(device.clone());
    assert_eq!(pool.pre_allocate_pools().unwrap(), 5);
    for category in PoolCategory::ALL {
        assert_eq!(pool.block_count(category), 1);
    }
    assert_eq!(device.heap_usage(0), 256 * MIB);

    // Categories that already own a block are left alone.
    assert_eq!(pool.pre_allocate_pools().unwrap(), 0);
    assert_eq!(pool.total_memory_usage().total, 276 * MIB);
}

#[test]
fn test_pre_allocate_skips_unconfigured_categories() {
    let pool = uniform_pool();
    assert_eq!(pool.pre_allocate_pools().unwrap(), 1);
    assert_eq!(pool.block_count(PoolCategory::Vertex), 0);
}

#[test]
fn test_pre_allocate_failure_keeps_created_blocks() {
    let device = Arc::new(HostDevice::new(HostDeviceConfig::with_heap_sizes(
        200 * MIB,
        512 * MIB,
    )));
    let pool = MemoryPool::with_defaults(device);

    let err = pool.pre_allocate_pools().unwrap_err();
    assert!(err.is_out_of_memory());
    assert_eq!(pool.block_count(PoolCategory::Vertex), 1);
    assert_eq!(pool.block_count(PoolCategory::Index), 1);
    assert_eq!(pool.block_count(PoolCategory::Uniform), 1);
    assert_eq!(pool.block_count(PoolCategory::Staging), 1);
    assert_eq!(pool.block_count(PoolCategory::Texture), 0);
}

#[test]
fn test_rendering_flag() {
    let pool = uniform_pool();
    assert!(!pool.is_rendering_active());
    pool.set_rendering_active(true);
    assert!(pool.is_rendering_active());
    assert!(pool.stats().rendering_active);
    pool.set_rendering_active(false);
    assert!(!pool.is_rendering_active());
}

#[test]
fn test_dedicated_block_is_never_reused() {
    let pool = MemoryPool::with_defaults(Arc::new(HostDevice::default()));
    let (buffer, dedicated) = pool
        .create_buffer(
            1000,
            BufferUsageFlags::VERTEX_BUFFER | BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .unwrap();
    let dedicated_id = dedicated.block();
    let info = pool.block_info(dedicated_id).unwrap();
    assert_eq!(info.kind, BlockKind::Dedicated);
    assert_eq!(info.free_units, 0);

    let pooled = pool.allocate(PoolCategory::Vertex, 64, 1).unwrap();
    assert_ne!(pooled.block(), dedicated_id);

    // Releasing the dedicated allocation frees its units, but the block
    // stays out of placement.
    pool.destroy_buffer(buffer, dedicated);
    let next = pool.allocate(PoolCategory::Vertex, 64, 1).unwrap();
    assert_ne!(next.block(), dedicated_id);
}

#[test]
fn test_stats_snapshot() {
    let pool = uniform_pool();
    let a = pool.allocate(PoolCategory::Uniform, 64, 1).unwrap();
    let _b = pool.allocate(PoolCategory::Uniform, 64, 1).unwrap();
    pool.deallocate(a);

    let stats = pool.stats();
    assert_eq!(stats.categories.len(), PoolCategory::COUNT);
    let uniform = stats
        .categories
        .iter()
        .find(|c| c.category == PoolCategory::Uniform)
        .unwrap();
    assert!(uniform.configured);
    assert_eq!(uniform.pooled_blocks, 1);
    assert_eq!(uniform.dedicated_blocks, 0);
    assert_eq!(uniform.usage, MemoryUsage { used: 64, total: 4096 });
    assert_eq!(uniform.free_units, 63);
    assert_eq!(uniform.largest_free_run_bytes, 62 * 64);
    assert_eq!(stats.total, uniform.usage);

    let vertex = &stats.categories[PoolCategory::Vertex.index()];
    assert!(!vertex.configured);
    assert_eq!(vertex.largest_free_run_bytes, 0);
}

#[test]
fn test_drop_frees_every_block() {
    let device = Arc::new(HostDevice::default());
    {
        let pool = MemoryPool::with_defaults(device.clone());
        let _a = pool.allocate(PoolCategory::Uniform, 64, 1).unwrap();
        let _b = pool.allocate(PoolCategory::Index, 64, 1).unwrap();
        assert_eq!(device.live_memory_objects(), 2);
    }
    assert_eq!(device.live_memory_objects(), 0);
    assert_eq!(device.heap_usage(0), 0);
    assert_eq!(device.heap_usage(1), 0);
}

#[test]
fn test_drop_destroys_live_resources() {
    let device = Arc::new(HostDevice::default());
    {
        let pool = MemoryPool::with_defaults(device.clone());
        let _buffer = pool
            .create_buffer(256, BufferUsageFlags::VERTEX_BUFFER, MemoryPropertyFlags::DEVICE_LOCAL)
            .unwrap();
        let desc = crate::device::ImageDesc::new_2d(8, 8, crate::device::Format::R8Unorm);
        let _image = pool
            .create_image(&desc, MemoryPropertyFlags::DEVICE_LOCAL)
            .unwrap();
        assert_eq!(device.live_buffers(), 1);
        assert_eq!(device.live_images(), 1);
    }
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_images(), 0);
    assert_eq!(device.live_memory_objects(), 0);
}

#[test]
fn test_destroy_unknown_buffer_leaves_device_alone() {
    let device = Arc::new(HostDevice::default());
    let pool = MemoryPool::with_defaults(device.clone());
    let (buffer, allocation) = pool
        .create_buffer(256, BufferUsageFlags::INDEX_BUFFER, MemoryPropertyFlags::DEVICE_LOCAL)
        .unwrap();
    let spare = pool.allocate(PoolCategory::Index, 64, 1).unwrap();

    pool.destroy_buffer(buffer, allocation);
    assert_eq!(device.live_buffers(), 0);
    // Second destroy of the same handle only releases the allocation.
    pool.destroy_buffer(buffer, spare);
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(pool.memory_usage(PoolCategory::Index).used, 0);
}

#[test]
fn test_device_local_category_is_mapped_on_unified_memory() {
    let pool = MemoryPool::with_defaults(Arc::new(HostDevice::new(HostDeviceConfig::unified(
        512 * MIB,
    ))));
    let alloc = pool.allocate(PoolCategory::Vertex, 1000, 16).unwrap();
    assert!(alloc.is_mapped());
    assert!(pool.block_info(alloc.block()).unwrap().is_mapped);

    pool.write(&alloc, 0, &[9; 16]).unwrap();
    let mut out = [0u8; 16];
    pool.read(&alloc, 0, &mut out).unwrap();
    assert_eq!(out, [9; 16]);
}
