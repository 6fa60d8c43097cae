//! App core for chat-bookmarks.
//!
//! Holds the bookmark store (the session object), the remote chat storage and
//! the runtime configuration, and drives the engines over them.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::host::fs::{FsChatContext, FsChatStorage};
#[cfg(feature = "http")]
use crate::host::http::HttpChatStorage;
use crate::host::{ChatContext, ChatNavigator, ChatStorage};
use crate::managers::bookmark_store::BookmarkStore;
use crate::services::bulk_eraser::{BulkEraser, ConfirmedErase, EraseReport};
use crate::services::collection_engine::{CollectionEngine, RebuildReport};
use crate::services::export_engine::ExportEngine;
use crate::services::import_engine::{ImportEngine, ImportReport};
use crate::services::write_queue::FlushReport;
use crate::types::chat::ChatFileInfo;
use crate::types::errors::{BookmarkError, HostError, ImportError};
use crate::types::export::{ExportPayload, FormatVersion};
use crate::types::settings::{AppConfig, StorageConfig};

/// Storage selected by [`StorageConfig`].
pub enum StorageBackend {
    Filesystem(FsChatStorage),
    #[cfg(feature = "http")]
    Http(HttpChatStorage),
}

#[async_trait]
impl ChatStorage for StorageBackend {
    async fn fetch_chat(&self, character_name: &str, chat_id: &str, avatar: &str) -> Result<Vec<Value>, HostError> {
        match self {
            Self::Filesystem(s) => s.fetch_chat(character_name, chat_id, avatar).await,
            #[cfg(feature = "http")]
            Self::Http(s) => s.fetch_chat(character_name, chat_id, avatar).await,
        }
    }

    async fn save_chat(&self, character_name: &str, chat_id: &str, avatar: &str, chat: &[Value]) -> Result<(), HostError> {
        match self {
            Self::Filesystem(s) => s.save_chat(character_name, chat_id, avatar, chat).await,
            #[cfg(feature = "http")]
            Self::Http(s) => s.save_chat(character_name, chat_id, avatar, chat).await,
        }
    }

    async fn list_character_chats(&self, avatar: &str) -> Result<Vec<ChatFileInfo>, HostError> {
        match self {
            Self::Filesystem(s) => s.list_character_chats(avatar).await,
            #[cfg(feature = "http")]
            Self::Http(s) => s.list_character_chats(avatar).await,
        }
    }
}

/// Central application struct.
pub struct App<C: ChatNavigator, S: ChatStorage> {
    pub store: BookmarkStore<C>,
    pub storage: S,
    pub config: AppConfig,
}

impl App<FsChatContext, StorageBackend> {
    /// Opens the configured data dir. Settings come from `settings.json`;
    /// remote chats from the filesystem or the configured HTTP host.
    pub fn from_config(config: AppConfig) -> Result<Self, HostError> {
        let root = config.resolved_data_dir();
        let mut context = FsChatContext::open(&root)?;
        let settings = context.load_settings()?;

        let storage = match &config.storage {
            StorageConfig::Filesystem => StorageBackend::Filesystem(FsChatStorage::new(&root)),
            #[cfg(feature = "http")]
            StorageConfig::Http { base_url, csrf_token } => {
                StorageBackend::Http(HttpChatStorage::new(base_url, csrf_token.clone()))
            }
            #[cfg(not(feature = "http"))]
            StorageConfig::Http { .. } => {
                return Err(HostError::Unavailable(
                    "built without the http feature".to_string(),
                ))
            }
        };

        info!(data_dir = %root.display(), characters = context.characters().len(), "app initialized");
        Ok(Self::new(BookmarkStore::new(context, settings), storage, config))
    }
}

impl<C: ChatNavigator, S: ChatStorage> App<C, S> {
    pub fn new(store: BookmarkStore<C>, storage: S, config: AppConfig) -> Self {
        Self {
            store,
            storage,
            config,
        }
    }

    /// Switches to another chat. Pending writes belong to the chat being left,
    /// so they are flushed first.
    pub fn open_chat(&mut self, character_id: usize, chat_id: &str) -> Result<usize, BookmarkError> {
        let report = self.store.flush();
        if !report.failed.is_empty() {
            warn!(failed = report.failed.len(), "pending writes failed before chat switch");
        }
        self.store
            .context_mut()
            .switch_to(character_id, chat_id)
            .map_err(|e| BookmarkError::ContextUnavailable(e.to_string()))?;
        self.store.switch_chat()
    }

    pub fn close_chat(&mut self) -> FlushReport {
        let report = self.store.flush();
        self.store.context_mut().leave_chat();
        self.store.unload();
        debug!("chat closed");
        report
    }

    pub async fn export(&self, version: FormatVersion) -> Result<ExportPayload, BookmarkError> {
        ExportEngine::new(&self.storage).export(&self.store, version).await
    }

    pub async fn import(&mut self, text: &str) -> Result<ImportReport, ImportError> {
        ImportEngine::new(&self.storage).import(&mut self.store, text).await
    }

    pub async fn rebuild_index(&mut self) -> Result<RebuildReport, HostError> {
        CollectionEngine::new(&self.storage)
            .rebuild_index(&mut self.store)
            .await
    }

    pub async fn erase(&mut self, confirmed: ConfirmedErase) -> EraseReport {
        BulkEraser::new(&self.storage)
            .execute(&mut self.store, confirmed)
            .await
    }

    /// Flushes once the coalescing window has passed since the first
    /// pending request.
    pub fn tick(&mut self, now: Instant) -> Option<FlushReport> {
        if self.store.queue().is_due(now, self.config.persist_debounce()) {
            Some(self.store.flush())
        } else {
            None
        }
    }

    pub fn flush(&mut self) -> FlushReport {
        self.store.flush()
    }
}
