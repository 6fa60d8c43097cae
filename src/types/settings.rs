use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::index::BookmarkIndex;

/// Settings container persisted between sessions. Hosts the bookmark index
/// and the one-shot migration flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSettings {
    #[serde(default)]
    pub bookmark_index: BookmarkIndex,
    #[serde(default)]
    pub migration_completed: bool,
}

/// Runtime configuration for the RPC binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root of `characters.json`, `settings.json` and `chats/`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Coalescing window for metadata and settings writes.
    #[serde(default = "default_debounce_ms")]
    pub persist_debounce_ms: u64,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_level: default_log_level(),
            persist_debounce_ms: default_debounce_ms(),
            storage: StorageConfig::default(),
        }
    }
}

/// Where remote chats are read from and written to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    /// JSONL chat files under `<data_dir>/chats`.
    #[default]
    Filesystem,
    /// A running host server's chat API.
    Http {
        base_url: String,
        #[serde(default)]
        csrf_token: Option<String>,
    },
}
