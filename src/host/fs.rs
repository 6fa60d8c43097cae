//! Filesystem host.
//!
//! Layout under the data directory:
//!
//! ```text
//! characters.json              [{ "name": ..., "avatar": ... }, ...]
//! settings.json                ExtensionSettings
//! legacy_bookmarks.json        pre-per-chat global bookmark list (optional)
//! chats/<character>/<chat>.jsonl
//! ```
//!
//! Chat files are JSON Lines: line 1 is the header carrying `chat_metadata`,
//! every following line is one message record.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{ChatContext, ChatNavigator, ChatStorage};
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::types::bookmark::ChatKey;
use crate::types::chat::{
    chat_id_from_file_name, validate_chat_segment, CharacterRef, ChatDocument, ChatFileInfo, ChatMetadata,
};
use crate::types::errors::HostError;
use crate::types::settings::ExtensionSettings;

pub const CHARACTERS_FILE: &str = "characters.json";
pub const SETTINGS_FILE: &str = "settings.json";
pub const LEGACY_BOOKMARKS_FILE: &str = "legacy_bookmarks.json";
pub const CHATS_DIR: &str = "chats";

/// Path of one chat file. Names that would leave `chats/<character>/` are
/// rejected.
pub fn chat_path(root: &Path, character_name: &str, chat_id: &str) -> Result<PathBuf, HostError> {
    validate_chat_segment(character_name).map_err(HostError::Rejected)?;
    validate_chat_segment(chat_id).map_err(HostError::Rejected)?;
    Ok(root
        .join(CHATS_DIR)
        .join(character_name)
        .join(format!("{}.jsonl", chat_id)))
}

/// Parses JSON Lines text, skipping blank lines.
pub fn parse_jsonl(text: &str) -> Result<Vec<Value>, HostError> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(|e| HostError::SerializationError(e.to_string())))
        .collect()
}

/// Renders entries as JSON Lines with a trailing newline.
pub fn to_jsonl(entries: &[Value]) -> Result<String, HostError> {
    let mut out = String::new();
    for entry in entries {
        let line = serde_json::to_string(entry).map_err(|e| HostError::SerializationError(e.to_string()))?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

/// Reads `characters.json`. A missing file means no characters.
pub fn read_characters(root: &Path) -> Result<Vec<CharacterRef>, HostError> {
    let path = root.join(CHARACTERS_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(&path)
        .map_err(|e| HostError::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content).map_err(|e| HostError::SerializationError(e.to_string()))
}

fn write_atomic(path: &Path, content: &str) -> Result<(), HostError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| HostError::IoError(format!("Failed to create chat directory: {}", e)))?;
    }
    let tmp = path.with_extension("jsonl.tmp");
    fs::write(&tmp, content).map_err(|e| HostError::IoError(format!("Failed to write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path).map_err(|e| HostError::IoError(format!("Failed to replace {}: {}", path.display(), e)))
}

/// Chat storage over JSONL files.
pub struct FsChatStorage {
    root: PathBuf,
}

impl FsChatStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ChatStorage for FsChatStorage {
    async fn fetch_chat(&self, character_name: &str, chat_id: &str, _avatar: &str) -> Result<Vec<Value>, HostError> {
        let path = chat_path(&self.root, character_name, chat_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HostError::NotFound(path.display().to_string()))
            }
            Err(e) => return Err(HostError::IoError(format!("Failed to read {}: {}", path.display(), e))),
        };
        parse_jsonl(&content)
    }

    async fn save_chat(&self, character_name: &str, chat_id: &str, _avatar: &str, chat: &[Value]) -> Result<(), HostError> {
        if chat.is_empty() {
            return Err(HostError::Rejected("refusing to write a chat without a header".to_string()));
        }
        let path = chat_path(&self.root, character_name, chat_id)?;
        let content = to_jsonl(chat)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HostError::IoError(format!("Failed to create chat directory: {}", e)))?;
        }
        let tmp = path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| HostError::IoError(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| HostError::IoError(format!("Failed to replace {}: {}", path.display(), e)))?;
        debug!(character = character_name, chat = chat_id, entries = chat.len(), "chat written");
        Ok(())
    }

    async fn list_character_chats(&self, avatar: &str) -> Result<Vec<ChatFileInfo>, HostError> {
        let characters = read_characters(&self.root)?;
        let Some(character) = characters.iter().find(|c| c.avatar == avatar) else {
            return Err(HostError::NotFound(format!("character with avatar '{}'", avatar)));
        };
        validate_chat_segment(&character.name).map_err(HostError::Rejected)?;
        let dir = self.root.join(CHATS_DIR).join(&character.name);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HostError::IoError(format!("Failed to list {}: {}", dir.display(), e))),
        };

        let mut chats = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| HostError::IoError(e.to_string()))?
        {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if !file_name.ends_with(".jsonl") {
                continue;
            }
            chats.push(ChatFileInfo {
                display_name: chat_id_from_file_name(&file_name).to_string(),
                file_name,
            });
        }
        chats.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(chats)
    }
}

/// Active-chat context over the same data directory.
pub struct FsChatContext {
    root: PathBuf,
    characters: Vec<CharacterRef>,
    active: Option<(ChatKey, ChatDocument)>,
    settings_engine: SettingsEngine,
}

impl FsChatContext {
    /// Reads the character list; no chat is active yet.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, HostError> {
        let root = root.as_ref().to_path_buf();
        let characters = read_characters(&root)?;
        let settings_engine = SettingsEngine::new(root.join(SETTINGS_FILE));
        Ok(Self {
            root,
            characters,
            active: None,
            settings_engine,
        })
    }

    /// Loads the persisted settings container.
    pub fn load_settings(&mut self) -> Result<ExtensionSettings, HostError> {
        self.settings_engine
            .load()
            .map_err(|e| HostError::IoError(e.to_string()))
    }

    /// Switches the active chat. A chat file that does not exist yet starts
    /// as a bare header. Path-like chat ids are `Rejected`.
    pub fn open_chat(&mut self, character_id: usize, chat_id: &str) -> Result<(), HostError> {
        let character = self
            .characters
            .get(character_id)
            .ok_or_else(|| HostError::NotFound(format!("character {}", character_id)))?;
        let path = chat_path(&self.root, &character.name, chat_id)?;
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| HostError::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
            parse_jsonl(&content)?
        } else {
            vec![json!({ "user_name": "User", "character_name": character.name, "chat_metadata": {} })]
        };
        let mut doc = ChatDocument::new(entries);
        // Make sure there is a metadata object to write into.
        doc.metadata_mut();
        self.active = Some((ChatKey::new(character_id, chat_id), doc));
        Ok(())
    }

    pub fn close_chat(&mut self) {
        self.active = None;
    }
}

impl ChatNavigator for FsChatContext {
    fn switch_to(&mut self, character_id: usize, chat_id: &str) -> Result<(), HostError> {
        self.open_chat(character_id, chat_id)
    }

    fn leave_chat(&mut self) {
        self.close_chat();
    }
}

impl ChatContext for FsChatContext {
    fn active_chat_key(&self) -> Option<ChatKey> {
        self.active.as_ref().map(|(key, _)| key.clone())
    }

    fn active_metadata(&self) -> Option<&ChatMetadata> {
        self.active.as_ref().and_then(|(_, doc)| doc.metadata())
    }

    fn active_metadata_mut(&mut self) -> Option<&mut ChatMetadata> {
        self.active.as_mut().and_then(|(_, doc)| doc.metadata_mut())
    }

    fn characters(&self) -> &[CharacterRef] {
        &self.characters
    }

    fn legacy_bookmarks(&self) -> Option<String> {
        fs::read_to_string(self.root.join(LEGACY_BOOKMARKS_FILE)).ok()
    }

    fn write_active_metadata(&mut self) -> Result<(), HostError> {
        let Some((key, doc)) = &self.active else {
            return Err(HostError::NotFound("no active chat".to_string()));
        };
        let character = self
            .characters
            .get(key.character_id)
            .ok_or_else(|| HostError::NotFound(format!("character {}", key.character_id)))?;
        let path = chat_path(&self.root, &character.name, &key.chat_id)?;
        write_atomic(&path, &to_jsonl(doc.entries())?)
    }

    fn write_settings(&mut self, settings: &ExtensionSettings) -> Result<(), HostError> {
        self.settings_engine.replace(settings.clone());
        self.settings_engine
            .save()
            .map_err(|e| HostError::IoError(e.to_string()))
    }
}
