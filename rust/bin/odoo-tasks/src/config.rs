//! Client configuration.
//!
//! Reads/writes `~/.odoo-tasks/config.toml`. Every section is optional; a
//! missing file means the stock dumps bag setup.

use std::path::{Path, PathBuf};

use odoo_dumps::{DatabaseSettings, DumpsSettings, Settings, ToolSettings};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Overrides the project name read from `.cookiecutter.context.yml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub dumps: DumpsSettings,

    #[serde(default)]
    pub tools: ToolSettings,
}

impl ClientConfig {
    /// Default config file path: ~/.odoo-tasks/config.toml.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    /// Load config from disk, or return default if file doesn't exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Save config to disk.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn settings(&self) -> Settings {
        Settings {
            database: self.database.clone(),
            dumps: self.dumps.clone(),
            tools: self.tools.clone(),
        }
    }
}

/// Return the tool's config directory (~/.odoo-tasks).
fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".odoo-tasks")
}
