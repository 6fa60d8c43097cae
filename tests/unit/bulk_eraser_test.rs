//! Tests for the two-step-confirmed bulk erase.

use async_trait::async_trait;
use chat_bookmarks::host::memory::{MemoryChatContext, MemoryChatStorage};
use chat_bookmarks::host::ChatContext;
use chat_bookmarks::managers::bookmark_store::{BookmarkStore, BookmarkStoreTrait};
use chat_bookmarks::services::bulk_eraser::{BulkEraser, ConfirmStep, Confirmer, ErasePlan};
use chat_bookmarks::types::bookmark::{BookmarkRecord, ChatKey, BOOKMARKS_METADATA_KEY};
use chat_bookmarks::types::chat::{write_stored_bookmarks, CharacterRef, ChatMetadata};
use chat_bookmarks::types::index::{BookmarkIndex, IndexSummary};
use chat_bookmarks::types::settings::ExtensionSettings;
use serde_json::json;

fn fixture() -> (BookmarkStore<MemoryChatContext>, MemoryChatStorage) {
    let storage = MemoryChatStorage::new();
    let mut metadata = ChatMetadata::new();
    metadata.insert("note".to_string(), json!("keep me"));
    write_stored_bookmarks(&mut metadata, &[BookmarkRecord::new(2, "remote", "")]).unwrap();
    storage.insert_chat("Bob", "b1", metadata, 4);

    let mut index = BookmarkIndex::new();
    index.set_count(&ChatKey::new(1, "b1"), 1);
    let settings = ExtensionSettings { bookmark_index: index, migration_completed: true };

    let mut ctx = MemoryChatContext::new(
        storage.clone(),
        vec![
            CharacterRef { name: "Alice".into(), avatar: "alice.png".into() },
            CharacterRef { name: "Bob".into(), avatar: "bob.png".into() },
        ],
    );
    ctx.open_chat(0, "c1");
    let mut store = BookmarkStore::new(ctx, settings);
    store.load().unwrap();
    store.add(1, "local", "").unwrap();
    (store, storage)
}

struct Scripted {
    answers: Vec<bool>,
    asked: Vec<ConfirmStep>,
}

#[async_trait]
impl Confirmer for Scripted {
    async fn confirm(&mut self, step: ConfirmStep, _summary: &IndexSummary) -> bool {
        self.asked.push(step);
        self.answers.get(self.asked.len() - 1).copied().unwrap_or(false)
    }
}

#[test]
fn test_plan_summarizes_index() {
    let (store, _storage) = fixture();
    let plan = ErasePlan::new(&store);
    assert_eq!(
        *plan.summary(),
        IndexSummary { characters: 2, chats: 2, bookmarks: 2 }
    );
    assert!(ErasePlan::new(&store).confirm_times(1).is_none());
    assert!(ErasePlan::new(&store).confirm_times(2).is_some());
}

#[tokio::test]
async fn test_erase_clears_every_indexed_chat() {
    let (mut store, storage) = fixture();
    let confirmed = ErasePlan::new(&store).confirm().confirm();
    let report = BulkEraser::new(&storage).execute(&mut store, confirmed).await;

    assert_eq!(report.characters, 2);
    assert_eq!(report.chats_cleared, 2);
    assert!(report.errors.is_empty());
    assert!(store.bookmarks().is_empty());
    assert!(store.index().is_empty());

    let remote = storage.chat_metadata("Bob", "b1").unwrap();
    assert!(remote.get(BOOKMARKS_METADATA_KEY).is_none());
    assert_eq!(remote["note"], json!("keep me"));
    assert_eq!(storage.chat("Bob", "b1").unwrap().len(), 5, "messages must survive");
}

#[tokio::test]
async fn test_failed_remote_write_still_empties_index() {
    let (mut store, storage) = fixture();
    storage.fail_save_for("b1");
    let confirmed = ErasePlan::new(&store).confirm().confirm();
    let report = BulkEraser::new(&storage).execute(&mut store, confirmed).await;

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.chats_cleared, 1);
    assert!(store.index().is_empty());
    assert!(store.bookmarks().is_empty());
}

#[tokio::test]
async fn test_unknown_character_counts_as_error() {
    let (mut store, storage) = fixture();
    store.update_index(Some(7), Some("ghost"), 3);
    let confirmed = ErasePlan::new(&store).confirm().confirm();
    let report = BulkEraser::new(&storage).execute(&mut store, confirmed).await;

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.chats_cleared, 2);
    assert!(store.index().is_empty());
}

#[tokio::test]
async fn test_erase_persists_cleared_active_chat() {
    let (mut store, storage) = fixture();
    let confirmed = ErasePlan::new(&store).confirm().confirm();
    BulkEraser::new(&storage).execute(&mut store, confirmed).await;
    store.flush();

    let active = storage.chat_metadata("Alice", "c1").unwrap();
    assert_eq!(active[BOOKMARKS_METADATA_KEY], json!([]));
    assert!(store.context().persisted_settings().unwrap().bookmark_index.is_empty());
}

#[tokio::test]
async fn test_declined_confirmation_erases_nothing() {
    let (mut store, storage) = fixture();
    let mut confirmer = Scripted { answers: vec![true, false], asked: Vec::new() };
    let outcome = BulkEraser::new(&storage)
        .erase_all_with(&mut store, &mut confirmer)
        .await;

    assert!(outcome.is_none());
    assert_eq!(confirmer.asked, vec![ConfirmStep::First, ConfirmStep::Final]);
    assert_eq!(store.bookmarks().len(), 1);
    assert_eq!(store.summary().chats, 2);
    assert_eq!(storage.fetch_count(), 0);
}

#[tokio::test]
async fn test_two_confirmations_run_the_erase() {
    let (mut store, storage) = fixture();
    let mut confirmer = Scripted { answers: vec![true, true], asked: Vec::new() };
    let report = BulkEraser::new(&storage)
        .erase_all_with(&mut store, &mut confirmer)
        .await
        .unwrap();
    assert_eq!(report.chats_cleared, 2);
    assert!(store.index().is_empty());
}
