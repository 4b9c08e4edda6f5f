// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Command implementations for `gpu-mempool-cli`.
//!
//! Each `run_*` function returns the process exit code.

pub mod config_cmd;
pub mod simulate;
pub mod status_format;

pub use config_cmd::{run_defaults, run_validate};
pub use simulate::{run_simulate, SimulateOptions, SimulationReport};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 2;
