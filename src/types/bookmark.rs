use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata key under which a chat's bookmark list is stored.
pub const BOOKMARKS_METADATA_KEY: &str = "message_bookmarks";

/// A named mark on one message of one chat.
///
/// Serialized with camelCase field names so the stored list and the export
/// files share one shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkRecord {
    pub id: String,
    pub message_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: String,
}

impl BookmarkRecord {
    /// Creates a record with a fresh id and the current timestamp.
    pub fn new(message_id: i64, name: &str, description: &str) -> Self {
        Self {
            id: new_bookmark_id(),
            message_id,
            name: name.to_string(),
            description: description.to_string(),
            created_at: now_iso(),
        }
    }

    /// Returns a copy carrying a freshly generated id.
    pub fn with_fresh_id(&self) -> Self {
        Self {
            id: new_bookmark_id(),
            ..self.clone()
        }
    }
}

/// Identifies exactly one bookmark list: a character index plus a chat id
/// (the chat file name without extension).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatKey {
    pub character_id: usize,
    pub chat_id: String,
}

impl ChatKey {
    pub fn new(character_id: usize, chat_id: &str) -> Self {
        Self {
            character_id,
            chat_id: chat_id.to_string(),
        }
    }
}

/// Two records are the same bookmark when they mark the same message with the
/// same name. Different names on one message are distinct bookmarks.
pub fn is_duplicate(a: &BookmarkRecord, b: &BookmarkRecord) -> bool {
    a.message_id == b.message_id && a.name == b.name
}

/// Stable ascending sort by `message_id`.
pub fn sort_by_message(list: &mut [BookmarkRecord]) {
    list.sort_by_key(|b| b.message_id);
}

/// Result of merging incoming records into a destination list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCount {
    pub imported: usize,
    pub duplicated: usize,
}

impl MergeCount {
    pub fn add(&mut self, other: MergeCount) {
        self.imported += other.imported;
        self.duplicated += other.duplicated;
    }
}

/// Merges `incoming` into `dest`, skipping records that duplicate anything
/// already in `dest` (including records merged earlier in the same call).
///
/// Accepted records always receive a fresh id. `dest` is re-sorted afterwards.
pub fn merge_into(dest: &mut Vec<BookmarkRecord>, incoming: &[BookmarkRecord]) -> MergeCount {
    let mut count = MergeCount::default();
    for record in incoming {
        if dest.iter().any(|existing| is_duplicate(existing, record)) {
            count.duplicated += 1;
            continue;
        }
        dest.push(record.with_fresh_id());
        count.imported += 1;
    }
    sort_by_message(dest);
    count
}

/// Generates an opaque bookmark id.
pub fn new_bookmark_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time as an ISO-8601 string with millisecond precision.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
