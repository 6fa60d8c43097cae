//! Host collaborators.
//!
//! The host application owns the active chat, its metadata blob, the list of
//! loaded characters and the chat files themselves. These traits are the only
//! way the bookmark layer reaches any of it.

pub mod fs;
#[cfg(feature = "http")]
pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::types::bookmark::ChatKey;
use crate::types::chat::{CharacterRef, ChatFileInfo, ChatMetadata};
use crate::types::errors::HostError;
use crate::types::settings::ExtensionSettings;

/// Synchronous view of the chat the user currently has open.
pub trait ChatContext {
    /// The active chat, or `None` when no chat is open.
    fn active_chat_key(&self) -> Option<ChatKey>;
    fn active_metadata(&self) -> Option<&ChatMetadata>;
    fn active_metadata_mut(&mut self) -> Option<&mut ChatMetadata>;
    /// Loaded characters, indexed by `character_id`.
    fn characters(&self) -> &[CharacterRef];
    /// Raw text of the pre-per-chat global bookmark list. Never modified.
    fn legacy_bookmarks(&self) -> Option<String>;
    /// Writes the active metadata blob. Called by the write queue on flush.
    fn write_active_metadata(&mut self) -> Result<(), HostError>;
    /// Writes the settings container. Called by the write queue on flush.
    fn write_settings(&mut self, settings: &ExtensionSettings) -> Result<(), HostError>;

    fn character(&self, character_id: usize) -> Option<&CharacterRef> {
        self.characters().get(character_id)
    }

    /// Exact-name lookup against the loaded character list.
    fn find_character(&self, name: &str) -> Option<(usize, &CharacterRef)> {
        self.characters().iter().enumerate().find(|(_, c)| c.name == name)
    }
}

/// A context the RPC layer can point at another chat.
pub trait ChatNavigator: ChatContext {
    fn switch_to(&mut self, character_id: usize, chat_id: &str) -> Result<(), HostError>;
    fn leave_chat(&mut self);
}

/// Remote chat storage. Element 0 of every chat is the header carrying the
/// metadata blob; the rest are message records that must round-trip untouched.
#[async_trait]
pub trait ChatStorage: Send + Sync {
    async fn fetch_chat(&self, character_name: &str, chat_id: &str, avatar: &str) -> Result<Vec<Value>, HostError>;
    async fn save_chat(&self, character_name: &str, chat_id: &str, avatar: &str, chat: &[Value]) -> Result<(), HostError>;
    async fn list_character_chats(&self, avatar: &str) -> Result<Vec<ChatFileInfo>, HostError>;
}
