//! Import Engine.
//!
//! Merges an export file back into the chats it came from. The payload is
//! decoded and validated up front (see [`ImportPayload`]); nothing is merged
//! unless the whole file is understood.
//!
//! Merging always compares against the destination chat's current
//! bookmarks by `(messageId, name)` and always assigns fresh ids. The active
//! chat is merged in memory and saved through the store; any other chat is
//! fetched, merged, written back whole and re-read to verify the count.

use serde::Serialize;
use tracing::{info, warn};

use crate::host::{ChatContext, ChatStorage};
use crate::managers::bookmark_store::{BookmarkStore, BookmarkStoreTrait};
use crate::types::bookmark::{merge_into, BookmarkRecord, MergeCount};
use crate::types::chat::{checked_chat_id, write_stored_bookmarks, CharacterRef, ChatDocument, StoredBookmarks};
use crate::types::errors::ImportError;
use crate::types::export::{ChatGroup, FormatVersion, ImportPayload};

/// Totals from one import.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub format: FormatVersion,
    pub imported: usize,
    pub duplicated: usize,
    /// Chats that received at least one new bookmark.
    pub chats_updated: usize,
    pub current_chat_touched: bool,
    pub characters_not_found: Vec<String>,
    pub errors: Vec<String>,
}

impl ImportReport {
    fn new(format: FormatVersion) -> Self {
        Self {
            format,
            imported: 0,
            duplicated: 0,
            chats_updated: 0,
            current_chat_touched: false,
            characters_not_found: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn record(&mut self, count: MergeCount) {
        self.imported += count.imported;
        self.duplicated += count.duplicated;
        if count.imported > 0 {
            self.chats_updated += 1;
        }
    }
}

pub struct ImportEngine<'a, S: ChatStorage> {
    storage: &'a S,
}

impl<'a, S: ChatStorage> ImportEngine<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Parses `text` and merges it. Returns `Err` only when nothing was touched.
    pub async fn import<C: ChatContext>(&self, store: &mut BookmarkStore<C>, text: &str) -> Result<ImportReport, ImportError> {
        let payload = ImportPayload::parse(text)?;
        self.import_payload(store, payload).await
    }

    pub async fn import_payload<C: ChatContext>(&self, store: &mut BookmarkStore<C>, payload: ImportPayload) -> Result<ImportReport, ImportError> {
        let mut report = ImportReport::new(payload.version());

        match payload {
            ImportPayload::Legacy(records) => {
                if store.active_key().is_none() || store.context().active_metadata().is_none() {
                    return Err(ImportError::ContextUnavailable(
                        "legacy imports go into the open chat".to_string(),
                    ));
                }
                self.merge_current(store, &records, &mut report);
            }
            ImportPayload::PerChat(groups) => {
                let key = store.active_key().ok_or_else(|| {
                    ImportError::ContextUnavailable("per-chat imports target the open character".to_string())
                })?;
                let character = store
                    .context()
                    .character(key.character_id)
                    .cloned()
                    .ok_or_else(|| {
                        ImportError::ContextUnavailable(format!("character {} is not loaded", key.character_id))
                    })?;
                self.merge_chats(store, key.character_id, &character, &groups, &mut report)
                    .await;
            }
            ImportPayload::PerCharacter(characters) => {
                for group in &characters {
                    let Some((character_id, character)) = store
                        .context()
                        .find_character(&group.character_name)
                        .map(|(id, c)| (id, c.clone()))
                    else {
                        warn!(character = %group.character_name, "imported character not found");
                        report.characters_not_found.push(group.character_name.clone());
                        continue;
                    };
                    self.merge_chats(store, character_id, &character, &group.chats, &mut report)
                        .await;
                }
            }
        }

        // Reload from metadata instead of trusting the in-memory list.
        if report.current_chat_touched {
            if let Err(e) = store.load() {
                report.errors.push(format!("reload after import failed: {}", e));
            }
        }

        info!(
            format = report.format.as_str(),
            imported = report.imported,
            duplicated = report.duplicated,
            errors = report.errors.len(),
            "import finished"
        );
        Ok(report)
    }

    async fn merge_chats<C: ChatContext>(
        &self,
        store: &mut BookmarkStore<C>,
        character_id: usize,
        character: &CharacterRef,
        groups: &[ChatGroup],
        report: &mut ImportReport,
    ) {
        let active = store.active_key();
        for group in groups {
            let chat_id = match checked_chat_id(&group.file_name) {
                Ok(chat_id) => chat_id,
                Err(msg) => {
                    warn!(character = %character.name, error = %msg, "imported chat skipped");
                    report.errors.push(format!("{}: {}", character.name, msg));
                    continue;
                }
            };
            let is_current = active.as_ref().is_some_and(|key| {
                key.character_id == character_id && (group.is_current || key.chat_id == chat_id)
            });

            if is_current {
                self.merge_current(store, &group.bookmarks, report);
                continue;
            }

            match self
                .merge_remote(store, character_id, character, chat_id, &group.bookmarks)
                .await
            {
                Ok(count) => report.record(count),
                Err(msg) => {
                    warn!(character = %character.name, chat = chat_id, error = %msg, "chat import failed");
                    report.errors.push(msg);
                }
            }
        }
    }

    fn merge_current<C: ChatContext>(&self, store: &mut BookmarkStore<C>, incoming: &[BookmarkRecord], report: &mut ImportReport) {
        let count = merge_into(store.working_set_mut(), incoming);
        report.record(count);
        report.current_chat_touched = true;
        if count.imported > 0 {
            if let Err(e) = store.save() {
                report.errors.push(format!("saving the open chat failed: {}", e));
            }
        }
    }

    /// Fetch, merge, write back, verify. Returns a message on failure.
    async fn merge_remote<C: ChatContext>(
        &self,
        store: &mut BookmarkStore<C>,
        character_id: usize,
        character: &CharacterRef,
        chat_id: &str,
        incoming: &[BookmarkRecord],
    ) -> Result<MergeCount, String> {
        let label = format!("{}/{}", character.name, chat_id);
        let entries = self
            .storage
            .fetch_chat(&character.name, chat_id, &character.avatar)
            .await
            .map_err(|e| format!("{}: fetch failed: {}", label, e))?;
        let mut doc = ChatDocument::new(entries);

        let mut merged = match doc.bookmarks() {
            StoredBookmarks::List(list) => list,
            StoredBookmarks::Missing => Vec::new(),
            StoredBookmarks::Malformed(msg) => {
                return Err(format!("{}: stored bookmarks unreadable: {}", label, msg))
            }
        };
        let count = merge_into(&mut merged, incoming);
        if count.imported == 0 {
            return Ok(count);
        }

        let metadata = doc
            .metadata_mut()
            .ok_or_else(|| format!("{}: chat has no header", label))?;
        write_stored_bookmarks(metadata, &merged).map_err(|e| format!("{}: {}", label, e))?;

        self.storage
            .save_chat(&character.name, chat_id, &character.avatar, doc.entries())
            .await
            .map_err(|e| format!("{}: save failed: {}", label, e))?;

        let expected = merged.len();
        let persisted = self.persisted_count(character, chat_id).await;
        store.update_index(Some(character_id), Some(chat_id), persisted.unwrap_or(expected));

        match persisted {
            Some(n) if n == expected => Ok(count),
            Some(n) => Err(format!(
                "{}: write verification failed, expected {} bookmarks but {} were persisted",
                label, expected, n
            )),
            None => Err(format!("{}: write verification failed, chat could not be re-read", label)),
        }
    }

    async fn persisted_count(&self, character: &CharacterRef, chat_id: &str) -> Option<usize> {
        let entries = self
            .storage
            .fetch_chat(&character.name, chat_id, &character.avatar)
            .await
            .ok()?;
        match ChatDocument::new(entries).bookmarks() {
            StoredBookmarks::List(list) => Some(list.len()),
            StoredBookmarks::Missing => Some(0),
            StoredBookmarks::Malformed(_) => None,
        }
    }
}
