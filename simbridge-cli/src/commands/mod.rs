pub mod config;
pub mod serve;

use anyhow::{Context, Result};
use simbridge::config::Config;

/// Load configuration from an explicit file or the standard locations
pub fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load configuration from {path}")),
        None => Config::load().context("Failed to load configuration"),
    }
}
