//! Runtime configuration for the RPC binary.
//!
//! The data dir comes from `CHAT_BOOKMARKS_DATA_DIR`, else the platform data
//! dir. An optional `config.json` inside it fills in the rest; every field has
//! a default, so a missing file is not an error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::platform;
use crate::types::errors::ConfigError;
use crate::types::settings::{AppConfig, StorageConfig};

pub const DATA_DIR_ENV: &str = "CHAT_BOOKMARKS_DATA_DIR";
pub const CONFIG_FILE: &str = "config.json";

/// Data dir from an env value, falling back to the platform default.
pub fn resolve_data_dir(env_value: Option<&str>) -> PathBuf {
    match env_value.map(str::trim) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => platform::get_data_dir(),
    }
}

/// Loads the configuration from the environment-selected data dir.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let env_value = std::env::var(DATA_DIR_ENV).ok();
    load_from(&resolve_data_dir(env_value.as_deref()))
}

/// Loads `<dir>/config.json`, defaulting everything it omits. `data_dir` is
/// always set on the result.
pub fn load_from(dir: &Path) -> Result<AppConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE);
    let mut config = if path.exists() {
        let content = fs::read_to_string(&path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str::<AppConfig>(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?
    } else {
        AppConfig::default()
    };
    if config.data_dir.is_none() {
        config.data_dir = Some(dir.to_path_buf());
    }
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        EnvFilter::try_new(&self.log_level)
            .map_err(|e| ConfigError::InvalidValue(format!("log_level {:?}: {}", self.log_level, e)))?;
        if let StorageConfig::Http { base_url, .. } = &self.storage {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue(format!(
                    "storage.base_url must be an http(s) URL, got {:?}",
                    base_url
                )));
            }
        }
        Ok(())
    }

    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(platform::get_data_dir)
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }
}
