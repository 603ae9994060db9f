//! `taskgate config` – show where the config lives and what is in effect.

use anyhow::{Context, Result};
use taskgate_core::config::{self, GateConfig};

pub fn run_config(cfg: &GateConfig) -> Result<()> {
    let path = config::config_path()?;
    let rendered = toml::to_string_pretty(cfg).context("render config as TOML")?;
    println!("# {}", path.display());
    print!("{}", rendered);
    Ok(())
}
