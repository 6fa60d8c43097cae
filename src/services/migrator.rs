// One-time legacy migration
// Moves the old single global bookmark list into the active chat's metadata.
// Gated by a persisted flag; only ever fills an empty destination and never
// touches the legacy source, which stays behind as a backup.

use serde::Serialize;
use tracing::{info, warn};

use crate::host::ChatContext;
use crate::managers::bookmark_store::BookmarkStore;
use crate::types::bookmark::{sort_by_message, BookmarkRecord};
use crate::types::chat::{read_stored_bookmarks, write_stored_bookmarks, StoredBookmarks};

/// What a migration attempt did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum MigrationOutcome {
    /// The flag was already set; nothing was examined.
    AlreadyCompleted,
    /// There is no legacy data.
    NoLegacyData,
    /// The legacy data is not a bookmark array, or is an empty one.
    NothingToMigrate,
    /// The active chat already has bookmarks of its own.
    DestinationNotEmpty,
    /// No chat was open to receive the data.
    NoActiveChat,
    /// `count` legacy bookmarks were copied into the active chat.
    Migrated { count: usize },
}

/// Runs the migration if it has not run yet. The flag is set after every
/// attempt, whether or not data was copied.
pub fn migrate_legacy<C: ChatContext>(store: &mut BookmarkStore<C>) -> MigrationOutcome {
    if store.settings().migration_completed {
        return MigrationOutcome::AlreadyCompleted;
    }

    let outcome = copy_legacy(store);
    store.mark_migration_completed();
    info!(?outcome, "legacy bookmark migration finished");
    outcome
}

fn copy_legacy<C: ChatContext>(store: &mut BookmarkStore<C>) -> MigrationOutcome {
    let Some(raw) = store.context().legacy_bookmarks() else {
        return MigrationOutcome::NoLegacyData;
    };

    let mut legacy: Vec<BookmarkRecord> = match serde_json::from_str(&raw) {
        Ok(list) => list,
        Err(e) => {
            warn!(error = %e, "legacy bookmark data is not a bookmark array");
            return MigrationOutcome::NothingToMigrate;
        }
    };
    if legacy.is_empty() {
        return MigrationOutcome::NothingToMigrate;
    }
    sort_by_message(&mut legacy);

    let Some(key) = store.active_key() else {
        warn!("legacy bookmarks present but no chat is open");
        return MigrationOutcome::NoActiveChat;
    };
    let Some(metadata) = store.context_mut().active_metadata_mut() else {
        return MigrationOutcome::NoActiveChat;
    };

    match read_stored_bookmarks(metadata) {
        StoredBookmarks::List(existing) if !existing.is_empty() => {
            return MigrationOutcome::DestinationNotEmpty
        }
        StoredBookmarks::Malformed(_) => return MigrationOutcome::DestinationNotEmpty,
        _ => {}
    }

    if let Err(e) = write_stored_bookmarks(metadata, &legacy) {
        warn!(error = %e, "failed to write migrated bookmarks");
        return MigrationOutcome::NothingToMigrate;
    }
    store.request_metadata_save();

    let count = legacy.len();
    store.update_index(Some(key.character_id), Some(&key.chat_id), count);
    MigrationOutcome::Migrated { count }
}
