//! Property-based tests for single-chat bookmark operations.
//!
//! Arbitrary sequences of add/edit/remove must leave the working list sorted
//! by message id and the chat's index entry equal to the list length.

use chat_bookmarks::host::memory::{MemoryChatContext, MemoryChatStorage};
use chat_bookmarks::managers::bookmark_store::{BookmarkStore, BookmarkStoreTrait};
use chat_bookmarks::types::bookmark::ChatKey;
use chat_bookmarks::types::chat::CharacterRef;
use chat_bookmarks::types::settings::ExtensionSettings;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Add { message_id: i64, name: String },
    /// Edits the bookmark at this position (modulo length).
    Edit { pick: usize, name: String },
    /// Removes the bookmark at this position (modulo length).
    Remove { pick: usize },
}

fn arb_name() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9 ]{0,12}"
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0i64..50, arb_name()).prop_map(|(message_id, name)| Op::Add { message_id, name }),
        1 => (any::<usize>(), arb_name()).prop_map(|(pick, name)| Op::Edit { pick, name }),
        2 => any::<usize>().prop_map(|pick| Op::Remove { pick }),
    ]
}

fn open_store() -> BookmarkStore<MemoryChatContext> {
    let mut ctx = MemoryChatContext::new(
        MemoryChatStorage::new(),
        vec![CharacterRef { name: "Alice".into(), avatar: "alice.png".into() }],
    );
    ctx.open_chat(0, "c1");
    let mut store = BookmarkStore::new(ctx, ExtensionSettings::default());
    store.load().expect("fresh chat loads");
    store
}

fn is_sorted(store: &BookmarkStore<MemoryChatContext>) -> bool {
    store
        .bookmarks()
        .windows(2)
        .all(|w| w[0].message_id <= w[1].message_id)
}

// *For any* sequence of add/edit/remove calls, the list is sorted ascending
// by message id after every call, and the index entry tracks its length.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn operations_keep_list_sorted_and_index_in_sync(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut store = open_store();
        let key = ChatKey::new(0, "c1");

        for op in ops {
            match op {
                Op::Add { message_id, name } => {
                    store.add(message_id, &name, "").expect("add succeeds with a chat open");
                }
                Op::Edit { pick, name } => {
                    if !store.bookmarks().is_empty() {
                        let id = store.bookmarks()[pick % store.bookmarks().len()].id.clone();
                        prop_assert!(store.edit(&id, &name, "edited").expect("edit succeeds"));
                    }
                }
                Op::Remove { pick } => {
                    if !store.bookmarks().is_empty() {
                        let id = store.bookmarks()[pick % store.bookmarks().len()].id.clone();
                        prop_assert!(store.remove(&id).expect("remove succeeds"));
                    }
                }
            }

            prop_assert!(is_sorted(&store));
            let len = store.bookmarks().len();
            match store.index().entry(&key) {
                Some(entry) => prop_assert_eq!(entry.count, len),
                None => {
                    prop_assert_eq!(len, 0);
                    prop_assert!(store.index().is_empty());
                }
            }
        }
    }

    // Two adds on one message with different names are two bookmarks.
    #[test]
    fn same_message_different_names_are_distinct(
        message_id in 0i64..1000,
        a in arb_name(),
        b in arb_name(),
    ) {
        prop_assume!(a.trim() != b.trim());
        let mut store = open_store();
        let first = store.add(message_id, &a, "").unwrap();
        let second = store.add(message_id, &b, "").unwrap();

        prop_assert_ne!(first.id, second.id);
        prop_assert_eq!(store.bookmarks_for_message(message_id).len(), 2);
    }
}
