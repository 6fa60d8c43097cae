//! In-memory host for tests and demos.
//!
//! `MemoryChatStorage` is cheaply cloneable and shares one chat map between
//! clones, so a `MemoryChatContext` built on a clone sees the same chats the
//! engines fetch and save. Fault injection covers failed fetches, failed
//! saves, lossy saves and a fully unavailable backend.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ChatContext, ChatNavigator, ChatStorage};
use crate::types::bookmark::{ChatKey, BOOKMARKS_METADATA_KEY};
use crate::types::chat::{
    validate_chat_segment, CharacterRef, ChatDocument, ChatFileInfo, ChatMetadata, CHAT_METADATA_FIELD,
};
use crate::types::errors::HostError;
use crate::types::settings::ExtensionSettings;

#[derive(Default)]
struct StorageState {
    /// (character name, chat id) -> chat entries
    chats: HashMap<(String, String), Vec<Value>>,
    /// avatar -> character name
    avatars: HashMap<String, String>,
    fail_fetch: HashSet<String>,
    fail_save: HashSet<String>,
    lossy_save: HashSet<String>,
}

#[derive(Default)]
struct StorageInner {
    state: Mutex<StorageState>,
    unavailable: AtomicBool,
    fetches: AtomicUsize,
    saves: AtomicUsize,
}

/// Shared in-memory chat storage.
#[derive(Clone, Default)]
pub struct MemoryChatStorage {
    inner: Arc<StorageInner>,
}

impl MemoryChatStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StorageState> {
        // A poisoned lock only means another test thread panicked mid-update.
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes `character`'s chats visible to `list_character_chats`.
    pub fn register_character(&self, character: &CharacterRef) {
        self.state()
            .avatars
            .insert(character.avatar.clone(), character.name.clone());
    }

    /// Inserts a chat with the given metadata and `messages` plain messages.
    pub fn insert_chat(&self, character_name: &str, chat_id: &str, metadata: ChatMetadata, messages: usize) {
        let mut entries = vec![json!({ "user_name": "User", "character_name": character_name, CHAT_METADATA_FIELD: metadata })];
        for i in 0..messages {
            entries.push(json!({ "name": if i % 2 == 0 { "User" } else { character_name }, "mes": format!("message {}", i) }));
        }
        self.state()
            .chats
            .insert((character_name.to_string(), chat_id.to_string()), entries);
    }

    /// Raw entries of a stored chat.
    pub fn chat(&self, character_name: &str, chat_id: &str) -> Option<Vec<Value>> {
        self.state()
            .chats
            .get(&(character_name.to_string(), chat_id.to_string()))
            .cloned()
    }

    pub fn chat_metadata(&self, character_name: &str, chat_id: &str) -> Option<ChatMetadata> {
        self.chat(character_name, chat_id)
            .and_then(|entries| ChatDocument::new(entries).metadata().cloned())
    }

    pub fn fail_fetch_for(&self, chat_id: &str) {
        self.state().fail_fetch.insert(chat_id.to_string());
    }

    pub fn fail_save_for(&self, chat_id: &str) {
        self.state().fail_save.insert(chat_id.to_string());
    }

    /// Saves of this chat silently drop the last stored bookmark.
    pub fn lossy_save_for(&self, chat_id: &str) {
        self.state().lossy_save.insert(chat_id.to_string());
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.inner.saves.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), HostError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(HostError::Unavailable("memory storage switched off".to_string()));
        }
        Ok(())
    }

    fn put(&self, character_name: &str, chat_id: &str, entries: Vec<Value>) {
        self.state()
            .chats
            .insert((character_name.to_string(), chat_id.to_string()), entries);
    }
}

#[async_trait]
impl ChatStorage for MemoryChatStorage {
    async fn fetch_chat(&self, character_name: &str, chat_id: &str, _avatar: &str) -> Result<Vec<Value>, HostError> {
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let state = self.state();
        if state.fail_fetch.contains(chat_id) {
            return Err(HostError::Rejected(format!("fetch of '{}' failed", chat_id)));
        }
        state
            .chats
            .get(&(character_name.to_string(), chat_id.to_string()))
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("{}/{}", character_name, chat_id)))
    }

    async fn save_chat(&self, character_name: &str, chat_id: &str, _avatar: &str, chat: &[Value]) -> Result<(), HostError> {
        self.inner.saves.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let (fail, lossy) = {
            let state = self.state();
            (state.fail_save.contains(chat_id), state.lossy_save.contains(chat_id))
        };
        if fail {
            return Err(HostError::Rejected(format!("save of '{}' failed", chat_id)));
        }
        let mut entries = chat.to_vec();
        if lossy {
            let mut doc = ChatDocument::new(entries);
            if let Some(list) = doc
                .metadata_mut()
                .and_then(|m| m.get_mut(BOOKMARKS_METADATA_KEY))
                .and_then(Value::as_array_mut)
            {
                list.pop();
            }
            entries = doc.into_entries();
        }
        self.put(character_name, chat_id, entries);
        Ok(())
    }

    async fn list_character_chats(&self, avatar: &str) -> Result<Vec<ChatFileInfo>, HostError> {
        self.check_available()?;
        let state = self.state();
        let Some(name) = state.avatars.get(avatar) else {
            return Ok(Vec::new());
        };
        let mut chats: Vec<ChatFileInfo> = state
            .chats
            .keys()
            .filter(|(character_name, _)| character_name == name)
            .map(|(_, chat_id)| ChatFileInfo {
                file_name: format!("{}.jsonl", chat_id),
                display_name: chat_id.clone(),
            })
            .collect();
        chats.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(chats)
    }
}

/// In-memory [`ChatContext`] backed by a shared [`MemoryChatStorage`].
pub struct MemoryChatContext {
    storage: MemoryChatStorage,
    characters: Vec<CharacterRef>,
    active: Option<ChatKey>,
    metadata: Option<ChatMetadata>,
    legacy: Option<String>,
    persisted_settings: Option<ExtensionSettings>,
    metadata_writes: usize,
    settings_writes: usize,
    fail_writes: bool,
}

impl MemoryChatContext {
    pub fn new(storage: MemoryChatStorage, characters: Vec<CharacterRef>) -> Self {
        for character in &characters {
            storage.register_character(character);
        }
        Self {
            storage,
            characters,
            active: None,
            metadata: None,
            legacy: None,
            persisted_settings: None,
            metadata_writes: 0,
            settings_writes: 0,
            fail_writes: false,
        }
    }

    /// Makes `chat_id` of `character_id` the active chat, creating an empty
    /// chat in storage when it does not exist yet.
    pub fn open_chat(&mut self, character_id: usize, chat_id: &str) {
        let name = self
            .characters
            .get(character_id)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        let metadata = match self.storage.chat_metadata(&name, chat_id) {
            Some(metadata) => metadata,
            None => {
                self.storage.insert_chat(&name, chat_id, ChatMetadata::new(), 0);
                ChatMetadata::new()
            }
        };
        self.active = Some(ChatKey::new(character_id, chat_id));
        self.metadata = Some(metadata);
    }

    /// Leaves the context with no active chat.
    pub fn close_chat(&mut self) {
        self.active = None;
        self.metadata = None;
    }

    pub fn set_legacy_bookmarks(&mut self, raw: Option<&str>) {
        self.legacy = raw.map(str::to_string);
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn persisted_settings(&self) -> Option<&ExtensionSettings> {
        self.persisted_settings.as_ref()
    }

    pub fn metadata_writes(&self) -> usize {
        self.metadata_writes
    }

    pub fn settings_writes(&self) -> usize {
        self.settings_writes
    }

    pub fn storage(&self) -> &MemoryChatStorage {
        &self.storage
    }
}

impl ChatNavigator for MemoryChatContext {
    fn switch_to(&mut self, character_id: usize, chat_id: &str) -> Result<(), HostError> {
        if character_id >= self.characters.len() {
            return Err(HostError::NotFound(format!("character {}", character_id)));
        }
        validate_chat_segment(chat_id).map_err(HostError::Rejected)?;
        self.open_chat(character_id, chat_id);
        Ok(())
    }

    fn leave_chat(&mut self) {
        self.close_chat();
    }
}

impl ChatContext for MemoryChatContext {
    fn active_chat_key(&self) -> Option<ChatKey> {
        self.active.clone()
    }

    fn active_metadata(&self) -> Option<&ChatMetadata> {
        self.metadata.as_ref()
    }

    fn active_metadata_mut(&mut self) -> Option<&mut ChatMetadata> {
        self.metadata.as_mut()
    }

    fn characters(&self) -> &[CharacterRef] {
        &self.characters
    }

    fn legacy_bookmarks(&self) -> Option<String> {
        self.legacy.clone()
    }

    fn write_active_metadata(&mut self) -> Result<(), HostError> {
        if self.fail_writes {
            return Err(HostError::IoError("metadata write disabled".to_string()));
        }
        let (Some(key), Some(metadata)) = (&self.active, &self.metadata) else {
            return Err(HostError::NotFound("no active chat".to_string()));
        };
        let name = self
            .characters
            .get(key.character_id)
            .map(|c| c.name.clone())
            .ok_or_else(|| HostError::NotFound(format!("character {}", key.character_id)))?;

        let entries = self
            .storage
            .chat(&name, &key.chat_id)
            .unwrap_or_else(|| vec![json!({})]);
        let mut doc = ChatDocument::new(entries);
        if let Some(slot) = doc.metadata_mut() {
            *slot = metadata.clone();
        }
        self.storage.put(&name, &key.chat_id, doc.into_entries());
        self.metadata_writes += 1;
        Ok(())
    }

    fn write_settings(&mut self, settings: &ExtensionSettings) -> Result<(), HostError> {
        if self.fail_writes {
            return Err(HostError::IoError("settings write disabled".to_string()));
        }
        self.persisted_settings = Some(settings.clone());
        self.settings_writes += 1;
        Ok(())
    }
}
