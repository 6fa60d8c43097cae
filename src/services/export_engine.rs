//! Export Engine.
//!
//! Builds the three export formats from the collection result:
//! v1 for the active chat, v2 for every chat of the active character, v3 for
//! every character.

use chrono::{NaiveDate, Utc};
use tracing::info;

use super::collection_engine::CollectionEngine;
use crate::host::{ChatContext, ChatStorage};
use crate::managers::bookmark_store::{BookmarkStore, BookmarkStoreTrait};
use crate::types::errors::BookmarkError;
use crate::types::export::{
    CharacterExport, ChatExport, ExportPayload, ExportV1, ExportV2, ExportV3, FormatVersion,
    VERSION_PER_CHARACTER, VERSION_PER_CHAT,
};

pub struct ExportEngine<'a, S: ChatStorage> {
    collection: CollectionEngine<'a, S>,
}

impl<'a, S: ChatStorage> ExportEngine<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self {
            collection: CollectionEngine::new(storage),
        }
    }

    /// Exports in the requested format.
    pub async fn export<C: ChatContext>(&self, store: &BookmarkStore<C>, version: FormatVersion) -> Result<ExportPayload, BookmarkError> {
        let payload = match version {
            FormatVersion::Legacy => export_current(store),
            FormatVersion::PerChat => self.export_character(store).await?,
            FormatVersion::PerCharacter => self.export_all(store).await,
        };
        info!(
            version = payload.version().as_str(),
            bookmarks = payload.total_bookmarks(),
            "bookmarks exported"
        );
        Ok(payload)
    }

    /// v2: every indexed chat of the active character.
    pub async fn export_character<C: ChatContext>(&self, store: &BookmarkStore<C>) -> Result<ExportPayload, BookmarkError> {
        let key = store
            .active_key()
            .ok_or_else(|| BookmarkError::ContextUnavailable("no active chat".to_string()))?;
        let chats = self.collection.collect_character(store, key.character_id).await;
        Ok(ExportPayload::V2(build_v2(chats)))
    }

    /// v3: every indexed chat of every character.
    pub async fn export_all<C: ChatContext>(&self, store: &BookmarkStore<C>) -> ExportPayload {
        let characters = self.collection.collect_all(store).await;
        ExportPayload::V3(build_v3(characters))
    }
}

/// v1: the active chat's working set.
pub fn export_current<C: ChatContext>(store: &BookmarkStore<C>) -> ExportPayload {
    ExportPayload::V1(ExportV1 {
        bookmarks: store.bookmarks().to_vec(),
    })
}

pub fn build_v2(chats: Vec<ChatExport>) -> ExportV2 {
    ExportV2 {
        version: VERSION_PER_CHAT.to_string(),
        total_chats: chats.len(),
        total_bookmarks: chats.iter().map(|c| c.bookmarks.len()).sum(),
        chat_bookmarks: chats,
    }
}

pub fn build_v3(characters: Vec<CharacterExport>) -> ExportV3 {
    ExportV3 {
        version: VERSION_PER_CHARACTER.to_string(),
        total_characters: characters.len(),
        total_chats: characters.iter().map(|c| c.chats.len()).sum(),
        total_bookmarks: characters
            .iter()
            .flat_map(|c| &c.chats)
            .map(|chat| chat.bookmarks.len())
            .sum(),
        character_bookmarks: characters,
    }
}

/// `bookmarks_<scope>_<YYYYMMDD>.json`, with the scope reduced to
/// filename-safe characters.
pub fn suggested_file_name(scope: &str, date: NaiveDate) -> String {
    let safe: String = scope
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let safe = if safe.is_empty() { "all".to_string() } else { safe };
    format!("bookmarks_{}_{}.json", safe, date.format("%Y%m%d"))
}

/// [`suggested_file_name`] for today.
pub fn suggested_file_name_today(scope: &str) -> String {
    suggested_file_name(scope, Utc::now().date_naive())
}
