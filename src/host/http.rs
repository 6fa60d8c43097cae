//! Chat storage backed by a running host server's HTTP chat API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::ChatStorage;
use crate::types::chat::{chat_id_from_file_name, ChatFileInfo};
use crate::types::errors::HostError;

#[derive(Serialize)]
struct GetChatRequest<'a> {
    ch_name: &'a str,
    file_name: &'a str,
    avatar_url: &'a str,
}

#[derive(Serialize)]
struct SaveChatRequest<'a> {
    ch_name: &'a str,
    file_name: &'a str,
    avatar_url: &'a str,
    chat: &'a [Value],
    force: bool,
}

#[derive(Serialize)]
struct ListChatsRequest<'a> {
    avatar_url: &'a str,
}

/// `reqwest` client for `/api/chats/get`, `/api/chats/save` and
/// `/api/characters/chats`.
pub struct HttpChatStorage {
    client: Client,
    base_url: String,
    csrf_token: Option<String>,
}

impl HttpChatStorage {
    pub fn new(base_url: &str, csrf_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            csrf_token,
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, HostError> {
        let mut request = self.client.post(self.endpoint(path)).json(body);
        if let Some(token) = &self.csrf_token {
            request = request.header("X-CSRF-Token", token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| HostError::Unavailable(format!("{}: {}", path, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(HostError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(HostError::Rejected(format!("{} returned {}", path, status)));
        }
        debug!(path, %status, "host request ok");
        response
            .json::<Value>()
            .await
            .map_err(|e| HostError::SerializationError(e.to_string()))
    }
}

#[async_trait]
impl ChatStorage for HttpChatStorage {
    async fn fetch_chat(&self, character_name: &str, chat_id: &str, avatar: &str) -> Result<Vec<Value>, HostError> {
        let body = GetChatRequest {
            ch_name: character_name,
            file_name: chat_id,
            avatar_url: avatar,
        };
        match self.post("/api/chats/get", &body).await? {
            Value::Array(entries) => Ok(entries),
            other => Err(HostError::SerializationError(format!(
                "expected a chat array, got {}",
                other
            ))),
        }
    }

    async fn save_chat(&self, character_name: &str, chat_id: &str, avatar: &str, chat: &[Value]) -> Result<(), HostError> {
        let body = SaveChatRequest {
            ch_name: character_name,
            file_name: chat_id,
            avatar_url: avatar,
            chat,
            force: true,
        };
        self.post("/api/chats/save", &body).await.map(|_| ())
    }

    async fn list_character_chats(&self, avatar: &str) -> Result<Vec<ChatFileInfo>, HostError> {
        let listed = self
            .post("/api/characters/chats", &ListChatsRequest { avatar_url: avatar })
            .await?;
        let items = match listed {
            Value::Array(items) => items,
            Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
            _ => Vec::new(),
        };
        Ok(items
            .iter()
            .filter_map(|item| item.get("file_name").and_then(Value::as_str))
            .map(|file_name| ChatFileInfo {
                file_name: file_name.to_string(),
                display_name: chat_id_from_file_name(file_name).to_string(),
            })
            .collect())
    }
}
