use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::bookmark::{BookmarkRecord, BOOKMARKS_METADATA_KEY};

/// Per-chat key-value store owned by the host. Only one key of it belongs to us.
pub type ChatMetadata = Map<String, Value>;

/// Field of the chat header (element 0) that carries the metadata blob.
pub const CHAT_METADATA_FIELD: &str = "chat_metadata";

/// A loaded character as the host lists it. Its position in the host's list
/// is the `character_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRef {
    pub name: String,
    pub avatar: String,
}

/// A chat file belonging to a character, used for display-name enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatFileInfo {
    pub file_name: String,
    pub display_name: String,
}

/// Strips a trailing `.jsonl` so chat ids and file names compare equal.
pub fn chat_id_from_file_name(file_name: &str) -> &str {
    file_name.strip_suffix(".jsonl").unwrap_or(file_name)
}

/// A chat id or character name must name exactly one chat, so it may not
/// carry a path separator, a relative component or a NUL byte.
pub fn validate_chat_segment(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("chat id must not be empty".to_string());
    }
    if value == "." || value == ".." || value.contains(['/', '\\', '\0']) {
        return Err(format!("'{}' is not a valid chat id", value.escape_default()));
    }
    Ok(())
}

/// [`chat_id_from_file_name`] for names that come from outside, such as an
/// import file.
pub fn checked_chat_id(file_name: &str) -> Result<&str, String> {
    let chat_id = chat_id_from_file_name(file_name);
    validate_chat_segment(chat_id)?;
    Ok(chat_id)
}

/// Problems reading bookmarks out of a metadata blob.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredBookmarks {
    /// The key is absent.
    Missing,
    /// The key holds a well-formed list (possibly empty).
    List(Vec<BookmarkRecord>),
    /// The key holds something that is not a bookmark list.
    Malformed(String),
}

/// Reads the bookmark list stored under the reserved key of `metadata`.
pub fn read_stored_bookmarks(metadata: &ChatMetadata) -> StoredBookmarks {
    match metadata.get(BOOKMARKS_METADATA_KEY) {
        None | Some(Value::Null) => StoredBookmarks::Missing,
        Some(value @ Value::Array(_)) => {
            match serde_json::from_value::<Vec<BookmarkRecord>>(value.clone()) {
                Ok(list) => StoredBookmarks::List(list),
                Err(e) => StoredBookmarks::Malformed(e.to_string()),
            }
        }
        Some(other) => StoredBookmarks::Malformed(format!(
            "expected an array under '{}', found {}",
            BOOKMARKS_METADATA_KEY,
            json_kind(other)
        )),
    }
}

/// Writes `list` under the reserved key, leaving every other key alone.
pub fn write_stored_bookmarks(metadata: &mut ChatMetadata, list: &[BookmarkRecord]) -> Result<(), serde_json::Error> {
    let value = serde_json::to_value(list)?;
    metadata.insert(BOOKMARKS_METADATA_KEY.to_string(), value);
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A chat as the remote storage returns it: element 0 is the header that
/// carries the metadata blob, elements 1..n are message records we never
/// inspect or modify.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatDocument {
    entries: Vec<Value>,
}

impl ChatDocument {
    pub fn new(entries: Vec<Value>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Value] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Value> {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of message records after the header.
    pub fn message_count(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }

    /// Returns the metadata blob, if the header carries one.
    pub fn metadata(&self) -> Option<&ChatMetadata> {
        self.entries
            .first()
            .and_then(|header| header.get(CHAT_METADATA_FIELD))
            .and_then(Value::as_object)
    }

    /// Returns the metadata blob for writing, creating the header field when
    /// it is missing. Returns `None` when there is no header object at all.
    pub fn metadata_mut(&mut self) -> Option<&mut ChatMetadata> {
        let header = self.entries.first_mut()?.as_object_mut()?;
        let slot = header
            .entry(CHAT_METADATA_FIELD.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        slot.as_object_mut()
    }

    /// Bookmarks stored in this chat's metadata.
    pub fn bookmarks(&self) -> StoredBookmarks {
        match self.metadata() {
            Some(metadata) => read_stored_bookmarks(metadata),
            None => StoredBookmarks::Missing,
        }
    }

    /// Removes the reserved bookmark key. Returns whether it was present.
    pub fn remove_bookmarks(&mut self) -> bool {
        let has_key = self
            .metadata()
            .is_some_and(|m| m.contains_key(BOOKMARKS_METADATA_KEY));
        if !has_key {
            return false;
        }
        self.metadata_mut()
            .map(|m| m.remove(BOOKMARKS_METADATA_KEY).is_some())
            .unwrap_or(false)
    }
}
