//! Sparse directory of which chats hold bookmarks and how many.
//!
//! The index is a derived cache: it never stores bookmark content and can
//! always be rebuilt from the per-chat metadata. It never holds a zero-count
//! entry or an empty character map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::bookmark::{now_iso, ChatKey};

/// Count and freshness of one chat's bookmarks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub count: usize,
    pub last_updated: String,
}

/// Aggregate totals, shown before destructive operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub characters: usize,
    pub chats: usize,
    pub bookmarks: usize,
}

/// `{ characterId: { chatId: { count, lastUpdated } } }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkIndex {
    characters: BTreeMap<usize, BTreeMap<String, IndexEntry>>,
}

impl BookmarkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `count` bookmarks for the chat. Missing keys are ignored with a
    /// warning. Returns whether the index was touched.
    pub fn update(&mut self, character_id: Option<usize>, chat_id: Option<&str>, count: usize) -> bool {
        let (Some(character_id), Some(chat_id)) = (character_id, chat_id) else {
            warn!(?character_id, ?chat_id, "index update skipped: incomplete chat key");
            return false;
        };

        if count > 0 {
            self.characters.entry(character_id).or_default().insert(
                chat_id.to_string(),
                IndexEntry {
                    count,
                    last_updated: now_iso(),
                },
            );
            return true;
        }

        let Some(chats) = self.characters.get_mut(&character_id) else {
            return false;
        };
        let removed = chats.remove(chat_id).is_some();
        if chats.is_empty() {
            self.characters.remove(&character_id);
        }
        removed
    }

    /// Convenience form of [`update`](Self::update) for a complete key.
    pub fn set_count(&mut self, key: &ChatKey, count: usize) {
        self.update(Some(key.character_id), Some(&key.chat_id), count);
    }

    pub fn entry(&self, key: &ChatKey) -> Option<&IndexEntry> {
        self.characters
            .get(&key.character_id)
            .and_then(|chats| chats.get(&key.chat_id))
    }

    pub fn contains(&self, key: &ChatKey) -> bool {
        self.entry(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Character ids that have at least one indexed chat, ascending.
    pub fn character_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.characters.keys().copied()
    }

    /// Indexed chats of one character, ordered by chat id.
    pub fn chats_of(&self, character_id: usize) -> impl Iterator<Item = (&str, &IndexEntry)> {
        self.characters
            .get(&character_id)
            .into_iter()
            .flat_map(|chats| chats.iter().map(|(id, entry)| (id.as_str(), entry)))
    }

    /// Every indexed chat key, ordered by character then chat id.
    pub fn keys(&self) -> Vec<ChatKey> {
        self.characters
            .iter()
            .flat_map(|(character_id, chats)| {
                chats.keys().map(move |chat_id| ChatKey::new(*character_id, chat_id))
            })
            .collect()
    }

    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            characters: self.characters.len(),
            chats: self.characters.values().map(BTreeMap::len).sum(),
            bookmarks: self
                .characters
                .values()
                .flat_map(BTreeMap::values)
                .map(|entry| entry.count)
                .sum(),
        }
    }

    pub fn clear(&mut self) {
        self.characters.clear();
    }
}
