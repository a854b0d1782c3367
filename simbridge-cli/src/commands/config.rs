use anyhow::{Context, Result};

use super::load_config;

pub fn execute(path: Option<&str>) -> Result<()> {
    let config = load_config(path)?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}
