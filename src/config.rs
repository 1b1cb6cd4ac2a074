use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub claude_api_key: Option<String>,

    #[serde(default = "default_search_url")]
    pub search_url: String,

    #[serde(default = "default_site_base")]
    pub site_base: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Seconds to wait between detail-page fetches.
    #[serde(default = "default_detail_delay")]
    pub detail_delay_secs: u64,

    /// Seconds to wait between Claude calls.
    #[serde(default = "default_model_delay")]
    pub model_delay_secs: u64,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("iphone-radar");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("listings.db").to_string_lossy().to_string()
}

fn default_search_url() -> String {
    "https://www.kleinanzeigen.de/s-handy-telekommunikation/iphone/k0c173".to_string()
}

fn default_site_base() -> String {
    "https://www.kleinanzeigen.de".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0".to_string()
}

fn default_detail_delay() -> u64 {
    2
}

fn default_model_delay() -> u64 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            claude_api_key: None,
            search_url: default_search_url(),
            site_base: default_site_base(),
            user_agent: default_user_agent(),
            detail_delay_secs: default_detail_delay(),
            model_delay_secs: default_model_delay(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("iphone-radar")
            .join("config.toml")
    }
}
