//! Print the effective configuration

use crate::util;
use anyhow::{Context, Result};
use std::path::Path;

pub fn run(config_path: Option<&Path>) -> Result<()> {
    let config = util::load_config(config_path)?;
    let rendered = config
        .to_toml_string()
        .context("Failed to render configuration")?;

    print!("{}", rendered);
    Ok(())
}
