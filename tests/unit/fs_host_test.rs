//! Tests for the filesystem host: JSONL chat files, character list, legacy
//! data and settings under one data directory.

use std::fs;
use std::path::Path;

use chat_bookmarks::host::fs::{chat_path, FsChatContext, FsChatStorage, CHARACTERS_FILE, LEGACY_BOOKMARKS_FILE};
use chat_bookmarks::host::{ChatContext, ChatStorage};
use chat_bookmarks::managers::bookmark_store::{BookmarkStore, BookmarkStoreTrait};
use chat_bookmarks::services::import_engine::ImportEngine;
use chat_bookmarks::types::bookmark::{ChatKey, BOOKMARKS_METADATA_KEY};
use chat_bookmarks::types::chat::ChatDocument;
use chat_bookmarks::types::errors::HostError;
use serde_json::json;
use tempfile::TempDir;

fn seed(root: &Path) {
    fs::write(
        root.join(CHARACTERS_FILE),
        r#"[{"name": "Alice", "avatar": "alice.png"}, {"name": "Bob", "avatar": "bob.png"}]"#,
    )
    .unwrap();
    let path = chat_path(root, "Bob", "b1").unwrap();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(
        &path,
        concat!(
            r#"{"user_name":"User","character_name":"Bob","chat_metadata":{"note":"x","message_bookmarks":[{"id":"1","messageId":2,"name":"remote","createdAt":"2024-01-01T00:00:00.000Z"}]}}"#,
            "\n",
            r#"{"name":"User","mes":"hello"}"#,
            "\n",
            r#"{"name":"Bob","mes":"hi"}"#,
            "\n"
        ),
    )
    .unwrap();
}

#[tokio::test]
async fn test_fetch_and_list_chats() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());
    let storage = FsChatStorage::new(dir.path());

    let entries = storage.fetch_chat("Bob", "b1", "bob.png").await.unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(ChatDocument::new(entries).message_count(), 2);

    let chats = storage.list_character_chats("bob.png").await.unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].file_name, "b1.jsonl");
    assert!(storage.list_character_chats("alice.png").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_chat_is_not_found() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());
    let storage = FsChatStorage::new(dir.path());
    let err = storage.fetch_chat("Bob", "nope", "bob.png").await.unwrap_err();
    assert!(matches!(err, HostError::NotFound(_)));
}

#[tokio::test]
async fn test_save_keeps_messages_and_other_metadata() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());
    let storage = FsChatStorage::new(dir.path());

    let mut doc = ChatDocument::new(storage.fetch_chat("Bob", "b1", "bob.png").await.unwrap());
    assert!(doc.remove_bookmarks());
    storage.save_chat("Bob", "b1", "bob.png", doc.entries()).await.unwrap();

    let reread = ChatDocument::new(storage.fetch_chat("Bob", "b1", "bob.png").await.unwrap());
    let metadata = reread.metadata().unwrap();
    assert!(metadata.get(BOOKMARKS_METADATA_KEY).is_none());
    assert_eq!(metadata["note"], json!("x"));
    assert_eq!(reread.entries()[2]["mes"], json!("hi"));
}

#[test]
fn test_store_over_fs_context_persists_on_flush() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());
    let mut ctx = FsChatContext::open(dir.path()).unwrap();
    let settings = ctx.load_settings().unwrap();
    ctx.open_chat(0, "a1").unwrap();
    let mut store = BookmarkStore::new(ctx, settings);
    store.load().unwrap();

    store.add(3, "first", "").unwrap();
    store.add(1, "second", "").unwrap();
    assert!(!chat_path(dir.path(), "Alice", "a1").unwrap().exists());
    let report = store.flush();
    assert!(report.failed.is_empty(), "{:?}", report.failed);

    let text = fs::read_to_string(chat_path(dir.path(), "Alice", "a1").unwrap()).unwrap();
    assert!(text.contains("\"messageId\":1"));

    let mut reopened = FsChatContext::open(dir.path()).unwrap();
    let settings = reopened.load_settings().unwrap();
    assert_eq!(settings.bookmark_index.entry(&ChatKey::new(0, "a1")).map(|e| e.count), Some(2));
    assert!(settings.migration_completed);
    reopened.open_chat(0, "a1").unwrap();
    let mut store = BookmarkStore::new(reopened, settings);
    assert_eq!(store.load().unwrap(), 2);
    assert_eq!(store.bookmarks()[0].name, "second");
}

#[test]
fn test_legacy_file_is_read_but_never_removed() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());
    fs::write(
        dir.path().join(LEGACY_BOOKMARKS_FILE),
        r#"[{"id":"old","messageId":4,"name":"from before","createdAt":"2022-05-05T00:00:00.000Z"}]"#,
    )
    .unwrap();

    let mut ctx = FsChatContext::open(dir.path()).unwrap();
    let settings = ctx.load_settings().unwrap();
    ctx.open_chat(0, "a1").unwrap();
    let mut store = BookmarkStore::new(ctx, settings);
    assert_eq!(store.load().unwrap(), 1);
    assert!(store.context().legacy_bookmarks().is_some());
    assert!(dir.path().join(LEGACY_BOOKMARKS_FILE).exists());
}

#[test]
fn test_open_unknown_character_fails() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());
    let mut ctx = FsChatContext::open(dir.path()).unwrap();
    assert!(matches!(ctx.open_chat(9, "x"), Err(HostError::NotFound(_))));
}

// ─── Path-like chat ids ───

#[test]
fn test_chat_path_rejects_traversal() {
    let dir = TempDir::new().unwrap();
    for (character, chat) in [("Alice", "../Bob/b1"), ("Alice", "a\\b"), ("..", "b1"), ("Alice", "..")] {
        assert!(
            matches!(chat_path(dir.path(), character, chat), Err(HostError::Rejected(_))),
            "{}/{} accepted",
            character,
            chat
        );
    }
}

#[test]
fn test_open_chat_with_path_like_id_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    seed(&data);

    let mut ctx = FsChatContext::open(&data).unwrap();
    let err = ctx.open_chat(0, "../../../escaped").unwrap_err();
    assert!(matches!(err, HostError::Rejected(_)), "{:?}", err);
    assert!(ctx.active_chat_key().is_none());

    let settings = ctx.load_settings().unwrap();
    let mut store = BookmarkStore::new(ctx, settings);
    assert!(store.add(1, "x", "").is_err());
    store.flush();
    assert!(!dir.path().join("escaped.jsonl").exists());
    assert!(!data.join("escaped.jsonl").exists());
}

#[tokio::test]
async fn test_storage_rejects_path_like_ids() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());
    let storage = FsChatStorage::new(dir.path());

    let err = storage.fetch_chat("Alice", "../Bob/b1", "alice.png").await.unwrap_err();
    assert!(matches!(err, HostError::Rejected(_)));
    let header = vec![json!({"chat_metadata": {}})];
    let err = storage.save_chat("..", "b1", "bob.png", &header).await.unwrap_err();
    assert!(matches!(err, HostError::Rejected(_)));
}

/// A file name that points into another character's folder must not merge
/// into that chat or leave an index entry under the importing character.
#[tokio::test]
async fn test_import_cannot_reach_another_characters_chat() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());
    let mut ctx = FsChatContext::open(dir.path()).unwrap();
    let settings = ctx.load_settings().unwrap();
    ctx.open_chat(0, "a1").unwrap();
    let mut store = BookmarkStore::new(ctx, settings);
    store.load().unwrap();
    let storage = FsChatStorage::new(dir.path());

    let text = json!({"version": "2.0", "chatBookmarks": [
        {"fileName": "../Bob/b1", "bookmarks": [{"messageId": 7, "name": "smuggled"}]}
    ]})
    .to_string();
    let report = ImportEngine::new(&storage).import(&mut store, &text).await.unwrap();

    assert_eq!(report.imported, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("not a valid chat id"), "{}", report.errors[0]);
    assert!(store.index().is_empty());

    let bob = ChatDocument::new(storage.fetch_chat("Bob", "b1", "bob.png").await.unwrap());
    let stored = &bob.metadata().unwrap()[BOOKMARKS_METADATA_KEY];
    assert_eq!(stored.as_array().unwrap().len(), 1);
    assert!(!stored.to_string().contains("smuggled"));
}
