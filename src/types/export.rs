//! Import/export file formats.
//!
//! Three generations exist:
//! - v1 (unversioned): `{ bookmarks: [...] }`, or a bare array of bookmarks.
//! - v2 (`"2.0"`): one group per chat of a single character.
//! - v3 (`"3.0"`): one group per character, each holding v2-style chat groups.
//!
//! Export writes typed structs. Import decodes by the `version` discriminant
//! and validates every field before anything is merged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::bookmark::{new_bookmark_id, now_iso, BookmarkRecord};
use super::errors::ImportError;

pub const VERSION_PER_CHAT: &str = "2.0";
pub const VERSION_PER_CHARACTER: &str = "3.0";

/// Format generation of an import/export payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatVersion {
    Legacy,
    PerChat,
    PerCharacter,
}

impl FormatVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatVersion::Legacy => "1.0",
            FormatVersion::PerChat => VERSION_PER_CHAT,
            FormatVersion::PerCharacter => VERSION_PER_CHARACTER,
        }
    }
}

/// Bookmarks of one chat inside a v2 or v3 file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatExport {
    pub chat_name: String,
    pub file_name: String,
    pub bookmarks: Vec<BookmarkRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_current: Option<bool>,
}

/// Bookmarks of one character inside a v3 file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterExport {
    pub character_name: String,
    pub character_id: usize,
    pub avatar: String,
    pub chats: Vec<ChatExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportV1 {
    pub bookmarks: Vec<BookmarkRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportV2 {
    pub version: String,
    pub total_chats: usize,
    pub total_bookmarks: usize,
    pub chat_bookmarks: Vec<ChatExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportV3 {
    pub version: String,
    pub total_characters: usize,
    pub total_chats: usize,
    pub total_bookmarks: usize,
    pub character_bookmarks: Vec<CharacterExport>,
}

/// Any export file, serialized exactly as its inner struct.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExportPayload {
    V1(ExportV1),
    V2(ExportV2),
    V3(ExportV3),
}

impl ExportPayload {
    pub fn version(&self) -> FormatVersion {
        match self {
            ExportPayload::V1(_) => FormatVersion::Legacy,
            ExportPayload::V2(_) => FormatVersion::PerChat,
            ExportPayload::V3(_) => FormatVersion::PerCharacter,
        }
    }

    pub fn total_bookmarks(&self) -> usize {
        match self {
            ExportPayload::V1(v1) => v1.bookmarks.len(),
            ExportPayload::V2(v2) => v2.total_bookmarks,
            ExportPayload::V3(v3) => v3.total_bookmarks,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// One chat's worth of validated incoming bookmarks.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatGroup {
    pub file_name: String,
    pub bookmarks: Vec<BookmarkRecord>,
    pub is_current: bool,
}

/// One character's worth of validated incoming chats.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterGroup {
    pub character_name: String,
    pub chats: Vec<ChatGroup>,
}

/// A decoded, fully validated import payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportPayload {
    Legacy(Vec<BookmarkRecord>),
    PerChat(Vec<ChatGroup>),
    PerCharacter(Vec<CharacterGroup>),
}

impl ImportPayload {
    pub fn version(&self) -> FormatVersion {
        match self {
            ImportPayload::Legacy(_) => FormatVersion::Legacy,
            ImportPayload::PerChat(_) => FormatVersion::PerChat,
            ImportPayload::PerCharacter(_) => FormatVersion::PerCharacter,
        }
    }

    /// Parses and validates raw file text.
    pub fn parse(text: &str) -> Result<Self, ImportError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ImportError::ParseError(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Decodes by the `version` discriminant. A missing version means v1, but
    /// only when the bookmark array is actually there.
    pub fn from_value(value: &Value) -> Result<Self, ImportError> {
        if let Value::Array(items) = value {
            return Ok(ImportPayload::Legacy(parse_bookmarks(items, "$")?));
        }
        let Value::Object(root) = value else {
            return Err(ImportError::UnsupportedFormat(
                "expected a JSON object or array".to_string(),
            ));
        };

        match version_of(root)? {
            None => {
                let items = root.get("bookmarks").and_then(Value::as_array).ok_or_else(|| {
                    ImportError::UnsupportedFormat(
                        "unversioned payload without a 'bookmarks' array".to_string(),
                    )
                })?;
                Ok(ImportPayload::Legacy(parse_bookmarks(items, "bookmarks")?))
            }
            Some(FormatVersion::Legacy) => {
                let items = required_array(root, "bookmarks", "$")?;
                Ok(ImportPayload::Legacy(parse_bookmarks(items, "bookmarks")?))
            }
            Some(FormatVersion::PerChat) => {
                let groups = required_array(root, "chatBookmarks", "$")?;
                Ok(ImportPayload::PerChat(parse_chat_groups(groups, "chatBookmarks")?))
            }
            Some(FormatVersion::PerCharacter) => {
                let groups = required_array(root, "characterBookmarks", "$")?;
                let mut characters = Vec::with_capacity(groups.len());
                for (i, group) in groups.iter().enumerate() {
                    let path = format!("characterBookmarks[{}]", i);
                    let obj = as_object(group, &path)?;
                    let character_name = required_string(obj, "characterName", &path)?;
                    let chats = required_array(obj, "chats", &path)?;
                    characters.push(CharacterGroup {
                        character_name,
                        chats: parse_chat_groups(chats, &format!("{}.chats", path))?,
                    });
                }
                Ok(ImportPayload::PerCharacter(characters))
            }
        }
    }
}

fn version_of(root: &Map<String, Value>) -> Result<Option<FormatVersion>, ImportError> {
    match root.get("version") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) if n.as_f64() == Some(1.0) => Ok(Some(FormatVersion::Legacy)),
        Some(Value::String(s)) => match s.as_str() {
            "1" | "1.0" => Ok(Some(FormatVersion::Legacy)),
            VERSION_PER_CHAT => Ok(Some(FormatVersion::PerChat)),
            VERSION_PER_CHARACTER => Ok(Some(FormatVersion::PerCharacter)),
            other => Err(ImportError::UnsupportedFormat(format!("unknown version '{}'", other))),
        },
        Some(other) => Err(ImportError::UnsupportedFormat(format!("unknown version {}", other))),
    }
}

fn parse_chat_groups(items: &[Value], path: &str) -> Result<Vec<ChatGroup>, ImportError> {
    let mut groups = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let path = format!("{}[{}]", path, i);
        let obj = as_object(item, &path)?;
        let file_name = required_string(obj, "fileName", &path)?;
        let bookmarks = required_array(obj, "bookmarks", &path)?;
        let is_current = match obj.get("isCurrent") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                return Err(ImportError::MalformedRecord(
                    format!("{}.isCurrent", path),
                    "expected a boolean".to_string(),
                ))
            }
        };
        groups.push(ChatGroup {
            file_name,
            bookmarks: parse_bookmarks(bookmarks, &format!("{}.bookmarks", path))?,
            is_current,
        });
    }
    Ok(groups)
}

/// Validates incoming bookmarks. Ids from the file are discarded.
fn parse_bookmarks(items: &[Value], path: &str) -> Result<Vec<BookmarkRecord>, ImportError> {
    let mut records = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let path = format!("{}[{}]", path, i);
        let obj = as_object(item, &path)?;

        let message_id = obj.get("messageId").and_then(Value::as_i64).ok_or_else(|| {
            ImportError::MalformedRecord(format!("{}.messageId", path), "expected an integer".to_string())
        })?;
        let name = required_string(obj, "name", &path)?;
        if name.trim().is_empty() {
            return Err(ImportError::MalformedRecord(
                format!("{}.name", path),
                "name must not be empty".to_string(),
            ));
        }
        let description = optional_string(obj, "description", &path)?.unwrap_or_default();
        let created_at = optional_string(obj, "createdAt", &path)?.unwrap_or_else(now_iso);

        records.push(BookmarkRecord {
            id: new_bookmark_id(),
            message_id,
            name,
            description,
            created_at,
        });
    }
    Ok(records)
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, ImportError> {
    value
        .as_object()
        .ok_or_else(|| ImportError::MalformedRecord(path.to_string(), "expected an object".to_string()))
}

fn required_array<'a>(obj: &'a Map<String, Value>, key: &str, path: &str) -> Result<&'a Vec<Value>, ImportError> {
    obj.get(key).and_then(Value::as_array).ok_or_else(|| {
        ImportError::MalformedRecord(format!("{}.{}", path, key), "expected an array".to_string())
    })
}

fn required_string(obj: &Map<String, Value>, key: &str, path: &str) -> Result<String, ImportError> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ImportError::MalformedRecord(format!("{}.{}", path, key), "expected a string".to_string()))
}

fn optional_string(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<String>, ImportError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ImportError::MalformedRecord(
            format!("{}.{}", path, key),
            "expected a string".to_string(),
        )),
    }
}
