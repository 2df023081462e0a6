//! Config file commands.

use std::path::Path;

use anyhow::Result;

use crate::config::ClientConfig;

/// Print the effective configuration.
pub fn show(config_path: &Path) -> Result<()> {
    let config = ClientConfig::load(config_path)?;
    println!("# {}", config_path.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Write a config file with the default settings.
pub fn init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it.",
            config_path.display()
        );
    }
    ClientConfig::default().save(config_path)?;
    println!("Config written to {}.", config_path.display());
    Ok(())
}
