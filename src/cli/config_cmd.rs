// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! `defaults` and `validate` commands.

use std::path::Path;

use super::status_format::print_config_table;
use super::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_SUCCESS};
use crate::pool::{PoolConfigFile, PoolConfigRegistry};

/// Print the built-in pool configuration, as a table or as TOML.
pub fn run_defaults(toml: bool) -> i32 {
    let registry = PoolConfigRegistry::with_defaults();
    if !toml {
        println!("Default pool configuration\n");
        print_config_table(&registry);
        return EXIT_SUCCESS;
    }
    match PoolConfigFile::from_registry(&registry).to_toml_string() {
        Ok(text) => {
            print!("{}", text);
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_FAILURE
        }
    }
}

/// Load and validate a pool config file.
pub fn run_validate(path: &Path) -> i32 {
    match validate_file(path) {
        Ok(registry) => {
            println!("{}: OK\n", path.display());
            print_config_table(&registry);
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            EXIT_CONFIG_ERROR
        }
    }
}

/// Registry holding exactly the categories the file configures.
pub fn validate_file(path: &Path) -> Result<PoolConfigRegistry, crate::PoolError> {
    let registry = PoolConfigFile::load(path)?.into_registry()?;
    registry.validate()?;
    Ok(registry)
}
