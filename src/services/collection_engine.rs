//! Collection Engine.
//!
//! Assembles bookmarks from every chat of every character by walking the
//! [`BookmarkIndex`](crate::types::index::BookmarkIndex) instead of every chat
//! the host knows about. The active chat is read from memory; all other chats
//! are fetched one at a time from [`ChatStorage`].
//!
//! Also home to the exhaustive index rebuild, the one operation that is
//! allowed to open chats the index says nothing about.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::host::{ChatContext, ChatStorage};
use crate::managers::bookmark_store::{BookmarkStore, BookmarkStoreTrait};
use crate::types::bookmark::{sort_by_message, BookmarkRecord, ChatKey};
use crate::types::chat::{chat_id_from_file_name, CharacterRef, ChatDocument, StoredBookmarks};
use crate::types::errors::HostError;
use crate::types::export::{CharacterExport, ChatExport};
use crate::types::index::BookmarkIndex;

/// Totals from an index rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildReport {
    pub characters_scanned: usize,
    pub chats_scanned: usize,
    pub chats_with_bookmarks: usize,
    pub bookmarks: usize,
    pub errors: usize,
}

pub struct CollectionEngine<'a, S: ChatStorage> {
    storage: &'a S,
}

impl<'a, S: ChatStorage> CollectionEngine<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Bookmarks of every indexed chat, grouped by character. Never fails:
    /// if the storage backend is unreachable the result degrades to the
    /// active chat alone.
    pub async fn collect_all<C: ChatContext>(&self, store: &BookmarkStore<C>) -> Vec<CharacterExport> {
        match self.try_collect(store, None).await {
            Ok(collected) => collected,
            Err(e) => {
                warn!(error = %e, "collection failed, falling back to the active chat");
                active_only(store)
            }
        }
    }

    /// Bookmarks of every indexed chat of one character.
    pub async fn collect_character<C: ChatContext>(&self, store: &BookmarkStore<C>, character_id: usize) -> Vec<ChatExport> {
        let collected = match self.try_collect(store, Some(character_id)).await {
            Ok(collected) => collected,
            Err(e) => {
                warn!(error = %e, "collection failed, falling back to the active chat");
                active_only(store)
                    .into_iter()
                    .filter(|c| c.character_id == character_id)
                    .collect()
            }
        };
        collected.into_iter().flat_map(|c| c.chats).collect()
    }

    async fn try_collect<C: ChatContext>(&self, store: &BookmarkStore<C>, only: Option<usize>) -> Result<Vec<CharacterExport>, HostError> {
        let index = store.index();
        let active = store.active_key();
        let active_unindexed = active
            .as_ref()
            .filter(|key| !store.bookmarks().is_empty() && !index.contains(key));

        if index.is_empty() && active_unindexed.is_none() {
            debug!("index empty, nothing to collect");
            return Ok(Vec::new());
        }

        let mut character_ids: Vec<usize> = index.character_ids().collect();
        if let Some(key) = active_unindexed {
            if !character_ids.contains(&key.character_id) {
                character_ids.push(key.character_id);
                character_ids.sort_unstable();
            }
        }

        let mut result = Vec::new();
        for character_id in character_ids {
            if only.is_some_and(|id| id != character_id) {
                continue;
            }
            let Some(character) = store.context().character(character_id) else {
                warn!(character_id, "indexed character is not loaded, skipping");
                continue;
            };

            let mut chat_ids: Vec<String> = index
                .chats_of(character_id)
                .map(|(chat_id, _)| chat_id.to_string())
                .collect();
            if let Some(key) = active_unindexed.filter(|k| k.character_id == character_id) {
                chat_ids.push(key.chat_id.clone());
            }

            let display_names = self.display_names(character).await;
            let mut chats = Vec::new();
            for chat_id in chat_ids {
                let key = ChatKey::new(character_id, &chat_id);
                let is_current = active.as_ref() == Some(&key);
                let bookmarks = if is_current {
                    store.bookmarks().to_vec()
                } else {
                    match self.fetch_bookmarks(character, &chat_id).await {
                        Ok(list) => list,
                        Err(e) if e.is_unavailable() => return Err(e),
                        Err(e) => {
                            warn!(character = %character.name, chat = %chat_id, error = %e, "skipping chat");
                            continue;
                        }
                    }
                };
                if bookmarks.is_empty() {
                    continue;
                }
                let chat_name = display_names
                    .iter()
                    .find(|(id, _)| *id == chat_id)
                    .map(|(_, name)| name.clone())
                    .unwrap_or_else(|| chat_id.clone());
                chats.push(ChatExport {
                    chat_name,
                    file_name: chat_id,
                    bookmarks,
                    is_current: is_current.then_some(true),
                });
            }

            if !chats.is_empty() {
                result.push(CharacterExport {
                    character_name: character.name.clone(),
                    character_id,
                    avatar: character.avatar.clone(),
                    chats,
                });
            }
        }
        Ok(result)
    }

    /// Bookmarks stored in a remote chat (empty when it has none).
    pub async fn fetch_bookmarks(&self, character: &CharacterRef, chat_id: &str) -> Result<Vec<BookmarkRecord>, HostError> {
        let entries = self
            .storage
            .fetch_chat(&character.name, chat_id, &character.avatar)
            .await?;
        match ChatDocument::new(entries).bookmarks() {
            StoredBookmarks::List(mut list) => {
                sort_by_message(&mut list);
                Ok(list)
            }
            StoredBookmarks::Missing => Ok(Vec::new()),
            StoredBookmarks::Malformed(msg) => Err(HostError::SerializationError(msg)),
        }
    }

    /// `(chat id, display name)` pairs; failures only cost the nicer names.
    async fn display_names(&self, character: &CharacterRef) -> Vec<(String, String)> {
        match self.storage.list_character_chats(&character.avatar).await {
            Ok(chats) => chats
                .into_iter()
                .map(|c| (chat_id_from_file_name(&c.file_name).to_string(), c.display_name))
                .collect(),
            Err(e) => {
                debug!(character = %character.name, error = %e, "chat list unavailable");
                Vec::new()
            }
        }
    }

    /// Scans every chat of every loaded character and replaces the index with
    /// the true counts.
    pub async fn rebuild_index<C: ChatContext>(&self, store: &mut BookmarkStore<C>) -> Result<RebuildReport, HostError> {
        let mut report = RebuildReport::default();
        let mut index = BookmarkIndex::new();
        let active = store.active_key();
        let characters: Vec<CharacterRef> = store.context().characters().to_vec();

        for (character_id, character) in characters.iter().enumerate() {
            report.characters_scanned += 1;
            let chats = match self.storage.list_character_chats(&character.avatar).await {
                Ok(chats) => chats,
                Err(e) if e.is_unavailable() => return Err(e),
                Err(e) => {
                    warn!(character = %character.name, error = %e, "cannot list chats");
                    report.errors += 1;
                    continue;
                }
            };

            for chat in chats {
                let chat_id = chat_id_from_file_name(&chat.file_name).to_string();
                let key = ChatKey::new(character_id, &chat_id);
                report.chats_scanned += 1;
                let count = if active.as_ref() == Some(&key) {
                    store.bookmarks().len()
                } else {
                    match self.fetch_bookmarks(character, &chat_id).await {
                        Ok(list) => list.len(),
                        Err(e) if e.is_unavailable() => return Err(e),
                        Err(e) => {
                            warn!(character = %character.name, chat = %chat_id, error = %e, "cannot read chat");
                            report.errors += 1;
                            continue;
                        }
                    }
                };
                if count > 0 {
                    report.chats_with_bookmarks += 1;
                    report.bookmarks += count;
                    index.set_count(&key, count);
                }
            }
        }

        // The active chat counts even if the host has not listed it yet.
        if let Some(key) = &active {
            if !store.bookmarks().is_empty() && !index.contains(key) {
                index.set_count(key, store.bookmarks().len());
                report.chats_with_bookmarks += 1;
                report.bookmarks += store.bookmarks().len();
            }
        }

        store.replace_index(index);
        info!(?report, "bookmark index rebuilt");
        Ok(report)
    }
}

/// The active chat's in-memory bookmarks as a one-character, one-chat result.
fn active_only<C: ChatContext>(store: &BookmarkStore<C>) -> Vec<CharacterExport> {
    let Some(key) = store.active_key() else {
        return Vec::new();
    };
    if store.bookmarks().is_empty() {
        return Vec::new();
    }
    let (name, avatar) = store
        .context()
        .character(key.character_id)
        .map(|c| (c.name.clone(), c.avatar.clone()))
        .unwrap_or_default();
    vec![CharacterExport {
        character_name: name,
        character_id: key.character_id,
        avatar,
        chats: vec![ChatExport {
            chat_name: key.chat_id.clone(),
            file_name: key.chat_id.clone(),
            bookmarks: store.bookmarks().to_vec(),
            is_current: Some(true),
        }],
    }]
}
