// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Help text for gpu-mempool-cli.

/// Print general usage information.
pub fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "gpu-mempool - Pooled GPU memory allocator v{}

USAGE:
    gpu-mempool-cli [COMMAND] [OPTIONS]

COMMANDS:
    defaults     Show the built-in pool configuration
    validate     Validate a TOML pool configuration file
    simulate     Run a synthetic workload and print pool statistics
    version      Show version information
    help         Show this help message

OPTIONS:
    -h, --help     Show help for command
    -V, --version  Show version information

EXAMPLES:
    gpu-mempool-cli defaults --toml > pools.toml
    gpu-mempool-cli validate pools.toml
    gpu-mempool-cli simulate --config pools.toml --allocations 1000
    gpu-mempool-cli simulate --json

ENVIRONMENT:
    RUST_LOG                Tracing filter (takes precedence)
    GPU_MEMPOOL_LOG_LEVEL   Log level (error, warn, info, debug, trace)
    GPU_MEMPOOL_LOG_FORMAT  Log format (human, json)

EXIT CODES:
    0  Success
    1  Failure
    2  Configuration error
",
        version
    );
}

/// Print detailed help for a specific command.
pub fn print_command_help(command: &str) {
    match command {
        "defaults" => print_defaults_help(),
        "validate" => print_validate_help(),
        "simulate" => print_simulate_help(),
        _ => {
            eprintln!(
                "No detailed help available for '{}'. Use 'gpu-mempool-cli help' for general usage.",
                command
            );
        }
    }
}

fn print_defaults_help() {
    eprintln!(
        "gpu-mempool-cli defaults - Show the built-in pool configuration

USAGE:
    gpu-mempool-cli defaults [--toml]

OPTIONS:
    --toml  Print as a TOML config file instead of a table
"
    );
}

fn print_validate_help() {
    eprintln!(
        "gpu-mempool-cli validate - Validate a pool configuration file

USAGE:
    gpu-mempool-cli validate <FILE>

DESCRIPTION:
    Parses [pools.<category>] tables and checks every entry. Categories are
    vertex, index, uniform, staging and texture.

EXIT CODES:
    0  Configuration is valid
    2  Configuration error
"
    );
}

fn print_simulate_help() {
    eprintln!(
        "gpu-mempool-cli simulate - Run a synthetic workload

USAGE:
    gpu-mempool-cli simulate [OPTIONS]

OPTIONS:
    --config FILE       Overlay a pool configuration file on the defaults
    --allocations N     Number of pooled allocations (default: 256)
    --size BYTES        Base allocation size, at most 1 GiB (default: 4096)
    --pre-allocate      Create one block per category before the workload
    --json              Output the report as JSON

EXIT CODES:
    0  Workload completed
    1  Device failure during the workload
    2  Configuration error
"
    );
}
