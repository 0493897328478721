use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;

/// TOML-backed configuration loaded from disk. Secrets stay as env vars.
/// Every section is optional; missing values fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub sheet: SheetConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProviderConfig {
    pub actor_id: String,
    pub poll_interval_secs: u64,
    pub wait_for_finish_secs: u32,
    pub language: String,
    pub page_size: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            actor_id: apify_client::GOOGLE_MAPS_SCRAPER.to_string(),
            poll_interval_secs: 5,
            wait_for_finish_secs: 30,
            language: "en".to_string(),
            page_size: 1000,
        }
    }
}

/// Names of the settings-tab columns a row's job input is built from, plus
/// display formatting for status cells.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SheetConfig {
    pub location_header: String,
    pub sub_niches_header: String,
    pub max_results_header: String,
    pub unique_id_header: String,
    pub timestamp_format: String,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            location_header: "Location".to_string(),
            sub_niches_header: "Sub-Niches".to_string(),
            max_results_header: "Max Results".to_string(),
            unique_id_header: "Unique ID".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S UTC".to_string(),
        }
    }
}

impl FileConfig {
    pub fn validate(&self) -> Result<()> {
        if StrftimeItems::new(&self.sheet.timestamp_format).any(|item| matches!(item, Item::Error)) {
            bail!(
                "sheet.timestamp_format is not a valid strftime format: {}",
                self.sheet.timestamp_format
            );
        }
        if self.provider.actor_id.trim().is_empty() {
            bail!("provider.actor_id must not be empty");
        }
        Ok(())
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}
