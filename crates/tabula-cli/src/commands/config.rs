//! Configuration display

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tabula_core::config::{default_config_path, default_config_toml};
use tabula_core::ConfigSource;

use super::load_config;

pub fn cmd_config(config_path: Option<&Path>, default: bool) -> Result<()> {
    if default {
        print!("{}", default_config_toml());
        return Ok(());
    }

    // Validates the file before showing it
    let config = load_config(config_path)?;

    println!("# Source: {}", config.source());
    match config.source() {
        ConfigSource::Embedded => {
            if let Some(path) = default_config_path() {
                println!("# Override path: {}", path.display());
            }
            print!("{}", default_config_toml());
        }
        ConfigSource::File(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            print!("{}", content);
        }
    }

    Ok(())
}
