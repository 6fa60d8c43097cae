//! RPC method handler for the chat-bookmarks JSON-RPC protocol.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! The `handle_method` function dispatches JSON-RPC method calls to the
//! bookmark store and engines via the `App` struct.

use serde_json::{json, Value};

use crate::app::App;
use crate::host::{ChatContext, ChatNavigator, ChatStorage};
use crate::managers::bookmark_store::BookmarkStoreTrait;
use crate::services::bulk_eraser::ErasePlan;
use crate::services::export_engine::suggested_file_name_today;
use crate::types::export::FormatVersion;

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", key))
}

fn i64_param(params: &Value, key: &str) -> Result<i64, String> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| format!("missing {}", key))
}

fn usize_param(params: &Value, key: &str) -> Result<usize, String> {
    params
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| format!("missing {}", key))
}

/// `"1.0"`, `"2"`, `3` ... Defaults to the per-character format.
pub fn parse_format_version(value: Option<&Value>) -> Result<FormatVersion, String> {
    let raw = match value {
        None | Some(Value::Null) => return Ok(FormatVersion::PerCharacter),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => return Err(format!("invalid version: {}", other)),
    };
    match raw.as_str() {
        "1" | "1.0" => Ok(FormatVersion::Legacy),
        "2" | "2.0" => Ok(FormatVersion::PerChat),
        "3" | "3.0" => Ok(FormatVersion::PerCharacter),
        _ => Err(format!("unsupported version: {}", raw)),
    }
}

/// Dispatch a JSON-RPC method call to the appropriate handler.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method<C: ChatNavigator, S: ChatStorage>(app: &mut App<C, S>, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true, "version": env!("CARGO_PKG_VERSION")})),

        // ─── Chat ───
        "chat.open" => {
            let character_id = usize_param(params, "character_id")?;
            let chat_id = str_param(params, "chat_id")?;
            let count = app.open_chat(character_id, chat_id).map_err(|e| e.to_string())?;
            Ok(json!({"character_id": character_id, "chat_id": chat_id, "count": count}))
        }
        "chat.close" => {
            let report = app.close_chat();
            Ok(json!({"flushed": report.written.len(), "failed": report.failed.len()}))
        }

        // ─── Bookmarks ───
        "bookmark.add" => {
            let message_id = i64_param(params, "message_id")?;
            let name = str_param(params, "name")?;
            let description = params.get("description").and_then(|v| v.as_str()).unwrap_or("");
            let record = app
                .store
                .add(message_id, name, description)
                .map_err(|e| e.to_string())?;
            serde_json::to_value(record).map_err(|e| e.to_string())
        }
        "bookmark.edit" => {
            let id = str_param(params, "id")?;
            let name = str_param(params, "name")?;
            let description = params.get("description").and_then(|v| v.as_str()).unwrap_or("");
            let updated = app.store.edit(id, name, description).map_err(|e| e.to_string())?;
            Ok(json!({"updated": updated}))
        }
        "bookmark.remove" => {
            let id = str_param(params, "id")?;
            let removed = app.store.remove(id).map_err(|e| e.to_string())?;
            Ok(json!({"removed": removed}))
        }
        "bookmark.list" => {
            let list = match params.get("message_id").and_then(|v| v.as_i64()) {
                Some(message_id) => serde_json::to_value(app.store.bookmarks_for_message(message_id)),
                None => serde_json::to_value(app.store.bookmarks()),
            };
            list.map_err(|e| e.to_string())
        }
        "bookmark.is_bookmarked" => {
            let message_id = i64_param(params, "message_id")?;
            Ok(json!(app.store.is_bookmarked(message_id)))
        }

        // ─── Index ───
        "index.get" => serde_json::to_value(app.store.index()).map_err(|e| e.to_string()),
        "index.summary" => serde_json::to_value(app.store.summary()).map_err(|e| e.to_string()),
        "index.rebuild" => {
            let report = app.rebuild_index().await.map_err(|e| e.to_string())?;
            serde_json::to_value(report).map_err(|e| e.to_string())
        }

        // ─── Import / export ───
        "export" => {
            let version = parse_format_version(params.get("version"))?;
            let payload = app.export(version).await.map_err(|e| e.to_string())?;
            let scope = match version {
                FormatVersion::Legacy => app.store.active_key().map(|k| k.chat_id).unwrap_or_default(),
                FormatVersion::PerChat => app
                    .store
                    .active_key()
                    .and_then(|k| app.store.context().character(k.character_id).map(|c| c.name.clone()))
                    .unwrap_or_default(),
                FormatVersion::PerCharacter => "all".to_string(),
            };
            Ok(json!({
                "fileName": suggested_file_name_today(&scope),
                "payload": payload,
            }))
        }
        "import" => {
            let text = match (params.get("text"), params.get("payload")) {
                (Some(Value::String(text)), _) => text.clone(),
                (_, Some(payload)) => payload.to_string(),
                _ => return Err("missing text or payload".to_string()),
            };
            let report = app.import(&text).await.map_err(|e| e.to_string())?;
            serde_json::to_value(report).map_err(|e| e.to_string())
        }

        // ─── Erase ───
        "erase.plan" => {
            let plan = ErasePlan::new(&app.store);
            Ok(json!({"summary": plan.summary(), "confirmations_required": 2}))
        }
        "erase.execute" => {
            let confirmations = match params.get("confirmations") {
                None | Some(Value::Null) => 0,
                Some(v) => v
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| format!("invalid confirmations: {}", v))?,
            };
            let confirmed = ErasePlan::new(&app.store)
                .confirm_times(confirmations)
                .ok_or("erase requires confirmations: 2")?;
            let report = app.erase(confirmed).await;
            serde_json::to_value(report).map_err(|e| e.to_string())
        }

        "flush" => {
            let report = app.flush();
            serde_json::to_value(report).map_err(|e| e.to_string())
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
