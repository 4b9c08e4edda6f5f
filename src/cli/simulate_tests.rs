//! Tests for the simulate command.

use std::io::Write;

use super::*;

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_parse_defaults() {
    let options = SimulateOptions::parse(&[]).unwrap();
    assert_eq!(options, SimulateOptions::default());
    assert_eq!(options.allocations, 256);
    assert_eq!(options.size, 4096);
}

#[test]
fn test_parse_all_options() {
    let options = SimulateOptions::parse(&args(&[
        "--config",
        "pools.toml",
        "--allocations",
        "12",
        "--size",
        "100",
        "--pre-allocate",
        "--json",
    ]))
    .unwrap();
    assert_eq!(options.config, Some(PathBuf::from("pools.toml")));
    assert_eq!(options.allocations, 12);
    assert_eq!(options.size, 100);
    assert!(options.pre_allocate);
    assert!(options.json);
}

#[test]
fn test_parse_errors() {
    assert!(SimulateOptions::parse(&args(&["--size"])).is_err());
    assert!(SimulateOptions::parse(&args(&["--size", "0"])).is_err());
    assert!(SimulateOptions::parse(&args(&["--size", "18446744073709551615"])).is_err());
    assert!(SimulateOptions::parse(&args(&["--size", "1073741825"])).is_err());
    assert_eq!(
        SimulateOptions::parse(&args(&["--size", "1073741824"]))
            .unwrap()
            .size,
        MAX_SIZE
    );
    assert!(SimulateOptions::parse(&args(&["--allocations", "many"])).is_err());
    assert!(SimulateOptions::parse(&args(&["--verbose"])).is_err());
}

#[test]
fn test_workload_releases_everything() {
    let device = Arc::new(HostDevice::default());
    let pool = MemoryPool::with_defaults(device.clone());
    let options = SimulateOptions {
        allocations: 40,
        size: 512,
        pre_allocate: true,
        ..Default::default()
    };

    let report = run_workload(&pool, &options).unwrap();
    assert_eq!(report.allocations, 40);
    assert_eq!(report.deallocations, 13);
    assert_eq!(report.failures, 0);
    assert_eq!(report.buffers, 2);
    assert_eq!(report.images, 3);
    assert_eq!(report.pre_allocated_blocks, 5);
    assert!(report.stats.total.used > 0);
    assert!(!report.stats.rendering_active);

    let texture = &report.stats.categories[PoolCategory::Texture.index()];
    assert_eq!(texture.dedicated_blocks, 3);

    assert_eq!(pool.total_memory_usage().used, 0);
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_images(), 0);
}

#[test]
fn test_workload_with_huge_size_counts_failures() {
    let device = Arc::new(HostDevice::default());
    let pool = MemoryPool::with_defaults(device.clone());
    let options = SimulateOptions {
        allocations: 2,
        size: u64::MAX,
        ..Default::default()
    };
    let err = run_workload(&pool, &options).unwrap_err();
    assert!(err.is_out_of_memory(), "{:?}", err);
    assert_eq!(pool.total_memory_usage().used, 0);
    assert_eq!(device.live_buffers(), 0);
}

#[test]
fn test_workload_reports_missing_category() {
    let pool = MemoryPool::new(Arc::new(HostDevice::default()));
    pool.configure(
        PoolCategory::Vertex,
        4096,
        64,
        MemoryPropertyFlags::DEVICE_LOCAL,
    );
    let err = run_workload(&pool, &SimulateOptions::default()).unwrap_err();
    assert!(matches!(err, PoolError::NotConfigured(PoolCategory::Index)));
}

#[test]
fn test_report_serializes_to_json() {
    let pool = MemoryPool::with_defaults(Arc::new(HostDevice::default()));
    let options = SimulateOptions {
        allocations: 8,
        ..Default::default()
    };
    let report = run_workload(&pool, &options).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["allocations"], 8);
    assert_eq!(json["stats"]["categories"][0]["category"], "vertex");
}

#[test]
fn test_run_simulate_with_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[pools.uniform]\nblock_size = 8192\nallocation_unit = 64\nproperties = [\"host_visible\"]"
    )
    .unwrap();
    let path = file.path().to_string_lossy().to_string();
    let code = run_simulate(&args(&["--config", &path, "--allocations", "16", "--json"]));
    assert_eq!(code, EXIT_SUCCESS);
}

#[test]
fn test_run_simulate_bad_config_is_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[pools.uniform]\nblock_size = 8192\nallocation_unit = 0").unwrap();
    let path = file.path().to_string_lossy().to_string();
    assert_eq!(run_simulate(&args(&["--config", &path])), EXIT_CONFIG_ERROR);
    assert_eq!(run_simulate(&args(&["--bogus"])), EXIT_CONFIG_ERROR);
}
