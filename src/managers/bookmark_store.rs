//! Bookmark store for the active chat.
//!
//! Implements `BookmarkStoreTrait`: the in-memory working list of the chat
//! currently open in the host, persisted into one reserved key of that chat's
//! metadata blob. Every save re-derives the chat's entry in the
//! [`BookmarkIndex`].
//!
//! The store is the session object: it owns the host context, the settings
//! container and the write queue, and is passed by reference to the engines.

use tracing::{debug, info, warn};

use crate::host::ChatContext;
use crate::services::migrator;
use crate::services::write_queue::{FlushReport, PersistTarget, WriteQueue};
use crate::types::bookmark::{sort_by_message, BookmarkRecord, ChatKey};
use crate::types::chat::{read_stored_bookmarks, write_stored_bookmarks, StoredBookmarks};
use crate::types::errors::BookmarkError;
use crate::types::index::{BookmarkIndex, IndexSummary};
use crate::types::settings::ExtensionSettings;

/// Trait defining single-chat bookmark operations.
pub trait BookmarkStoreTrait {
    fn load(&mut self) -> Result<usize, BookmarkError>;
    fn save(&mut self) -> Result<(), BookmarkError>;
    fn add(&mut self, message_id: i64, name: &str, description: &str) -> Result<BookmarkRecord, BookmarkError>;
    fn edit(&mut self, id: &str, name: &str, description: &str) -> Result<bool, BookmarkError>;
    fn remove(&mut self, id: &str) -> Result<bool, BookmarkError>;
    fn is_bookmarked(&self, message_id: i64) -> bool;
    fn bookmarks(&self) -> &[BookmarkRecord];
}

/// Working set of the active chat plus the state shared by all engines.
pub struct BookmarkStore<C: ChatContext> {
    context: C,
    bookmarks: Vec<BookmarkRecord>,
    settings: ExtensionSettings,
    queue: WriteQueue,
}

impl<C: ChatContext> BookmarkStore<C> {
    /// Creates a store over `context` with previously persisted `settings`.
    /// Call [`load`](BookmarkStoreTrait::load) before use.
    pub fn new(context: C, settings: ExtensionSettings) -> Self {
        Self {
            context,
            bookmarks: Vec::new(),
            settings,
            queue: WriteQueue::new(),
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn active_key(&self) -> Option<ChatKey> {
        self.context.active_chat_key()
    }

    pub fn settings(&self) -> &ExtensionSettings {
        &self.settings
    }

    pub fn index(&self) -> &BookmarkIndex {
        &self.settings.bookmark_index
    }

    pub fn summary(&self) -> IndexSummary {
        self.settings.bookmark_index.summary()
    }

    pub fn queue(&self) -> &WriteQueue {
        &self.queue
    }

    /// Looks a bookmark up by id.
    pub fn get(&self, id: &str) -> Option<&BookmarkRecord> {
        self.bookmarks.iter().find(|b| b.id == id)
    }

    /// All bookmarks pointing at `message_id`, in list order.
    pub fn bookmarks_for_message(&self, message_id: i64) -> Vec<&BookmarkRecord> {
        self.bookmarks
            .iter()
            .filter(|b| b.message_id == message_id)
            .collect()
    }

    /// Replaces the working set after the host switched chats.
    pub fn switch_chat(&mut self) -> Result<usize, BookmarkError> {
        self.load()
    }

    /// Drops the working set after the host closed its chat. The migration
    /// is left for the next chat that opens.
    pub fn unload(&mut self) {
        self.bookmarks.clear();
    }

    /// Writes every pending metadata/settings save now.
    pub fn flush(&mut self) -> FlushReport {
        self.queue.flush(&mut self.context, &self.settings)
    }

    /// Records `count` for a chat and schedules a settings save.
    pub fn update_index(&mut self, character_id: Option<usize>, chat_id: Option<&str>, count: usize) {
        // An unchanged index would rewrite identical settings; skip the save.
        if self.settings.bookmark_index.update(character_id, chat_id, count) {
            self.queue.request(PersistTarget::ExtensionSettings);
        }
    }

    /// Empties the index and schedules a settings save.
    pub fn reset_index(&mut self) {
        self.settings.bookmark_index.clear();
        self.queue.request(PersistTarget::ExtensionSettings);
    }

    /// Installs a freshly rebuilt index and schedules a settings save.
    pub fn replace_index(&mut self, index: BookmarkIndex) {
        self.settings.bookmark_index = index;
        self.queue.request(PersistTarget::ExtensionSettings);
    }

    pub(crate) fn working_set_mut(&mut self) -> &mut Vec<BookmarkRecord> {
        &mut self.bookmarks
    }

    pub(crate) fn mark_migration_completed(&mut self) {
        self.settings.migration_completed = true;
        self.queue.request(PersistTarget::ExtensionSettings);
    }

    pub(crate) fn request_metadata_save(&mut self) {
        self.queue.request(PersistTarget::ActiveChatMetadata);
    }

    fn read_active(&self) -> Result<Vec<BookmarkRecord>, BookmarkError> {
        let metadata = self.context.active_metadata().ok_or_else(|| {
            BookmarkError::ContextUnavailable("no active chat metadata".to_string())
        })?;
        match read_stored_bookmarks(metadata) {
            StoredBookmarks::Missing => Ok(Vec::new()),
            StoredBookmarks::List(mut list) => {
                sort_by_message(&mut list);
                Ok(list)
            }
            StoredBookmarks::Malformed(msg) => Err(BookmarkError::SerializationError(msg)),
        }
    }

    fn validate_name(name: &str) -> Result<String, BookmarkError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(BookmarkError::InvalidName("name must not be empty".to_string()));
        }
        Ok(trimmed.to_string())
    }
}

impl<C: ChatContext> BookmarkStoreTrait for BookmarkStore<C> {
    /// Reads the active chat's list, running the one-time legacy migration
    /// first. Any failure leaves the working set empty and is returned.
    fn load(&mut self) -> Result<usize, BookmarkError> {
        migrator::migrate_legacy(self);

        match self.read_active() {
            Ok(list) => {
                self.bookmarks = list;
                debug!(count = self.bookmarks.len(), "bookmarks loaded");
                Ok(self.bookmarks.len())
            }
            Err(e) => {
                warn!(error = %e, "failed to load bookmarks, starting empty");
                self.bookmarks.clear();
                Err(e)
            }
        }
    }

    /// Copies the working set into the active metadata, schedules the
    /// metadata write and refreshes the index entry.
    fn save(&mut self) -> Result<(), BookmarkError> {
        let Some(key) = self.context.active_chat_key() else {
            warn!("save skipped: no active chat");
            return Err(BookmarkError::ContextUnavailable("no active chat".to_string()));
        };
        let snapshot = self.bookmarks.clone();
        let metadata = self.context.active_metadata_mut().ok_or_else(|| {
            warn!(chat = %key.chat_id, "save skipped: active chat has no metadata");
            BookmarkError::ContextUnavailable("no active chat metadata".to_string())
        })?;
        write_stored_bookmarks(metadata, &snapshot)
            .map_err(|e| BookmarkError::SerializationError(e.to_string()))?;

        self.queue.request(PersistTarget::ActiveChatMetadata);
        self.update_index(Some(key.character_id), Some(&key.chat_id), snapshot.len());
        Ok(())
    }

    /// Adds a bookmark. Several bookmarks may target the same message.
    fn add(&mut self, message_id: i64, name: &str, description: &str) -> Result<BookmarkRecord, BookmarkError> {
        let name = Self::validate_name(name)?;
        if self.context.active_metadata().is_none() {
            return Err(BookmarkError::ContextUnavailable("no active chat".to_string()));
        }
        let record = BookmarkRecord::new(message_id, &name, description);
        self.bookmarks.push(record.clone());
        sort_by_message(&mut self.bookmarks);
        self.save()?;
        info!(id = %record.id, message_id, "bookmark added");
        Ok(record)
    }

    /// Renames/re-describes a bookmark. Returns `false` when the id is unknown.
    fn edit(&mut self, id: &str, name: &str, description: &str) -> Result<bool, BookmarkError> {
        let name = Self::validate_name(name)?;
        let Some(record) = self.bookmarks.iter_mut().find(|b| b.id == id) else {
            return Ok(false);
        };
        record.name = name;
        record.description = description.to_string();
        self.save()?;
        info!(id, "bookmark edited");
        Ok(true)
    }

    /// Removes a bookmark. Returns `false` when the id is unknown.
    fn remove(&mut self, id: &str) -> Result<bool, BookmarkError> {
        let Some(pos) = self.bookmarks.iter().position(|b| b.id == id) else {
            return Ok(false);
        };
        self.bookmarks.remove(pos);
        self.save()?;
        info!(id, "bookmark removed");
        Ok(true)
    }

    fn is_bookmarked(&self, message_id: i64) -> bool {
        self.bookmarks.iter().any(|b| b.message_id == message_id)
    }

    fn bookmarks(&self) -> &[BookmarkRecord] {
        &self.bookmarks
    }
}
