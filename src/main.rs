// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! gpu-mempool-cli entry point.
//!
//! Inspects pool configuration files and runs synthetic workloads against the
//! host-backed device.

mod cli_parser;

use std::path::Path;
use std::process::ExitCode;

use gpu_mempool::cli::{run_defaults, run_simulate, run_validate, EXIT_CONFIG_ERROR};
use gpu_mempool::logging;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    if let Err(e) = logging::init_from_env() {
        eprintln!("Logging setup failed: {}", e);
        return ExitCode::from(EXIT_CONFIG_ERROR as u8);
    }

    match command {
        "defaults" => {
            let toml = args.get(2).map(|s| s.as_str()) == Some("--toml");
            exit(run_defaults(toml))
        }
        "validate" => match args.get(2) {
            Some(path) => exit(run_validate(Path::new(path))),
            None => {
                eprintln!("validate requires a config file path");
                cli_parser::print_command_help("validate");
                exit(EXIT_CONFIG_ERROR)
            }
        },
        "simulate" => exit(run_simulate(&args[2..])),
        "help" | "--help" | "-h" => {
            if let Some(sub) = args.get(2) {
                cli_parser::print_command_help(sub);
            } else {
                cli_parser::print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("gpu-mempool {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            cli_parser::print_usage();
            ExitCode::FAILURE
        }
    }
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(code as u8)
}
