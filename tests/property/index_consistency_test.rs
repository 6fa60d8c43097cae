//! Property-based tests for the bookmark index and the duplicate-aware merge.

use std::collections::BTreeMap;

use chat_bookmarks::types::bookmark::{is_duplicate, merge_into, BookmarkRecord, ChatKey};
use chat_bookmarks::types::index::BookmarkIndex;
use proptest::prelude::*;

fn arb_update() -> impl Strategy<Value = (usize, String, usize)> {
    (0usize..4, "[a-c]{1,2}", 0usize..5)
}

fn arb_record() -> impl Strategy<Value = BookmarkRecord> {
    (0i64..10, prop_oneof![Just("A"), Just("B"), Just("C")])
        .prop_map(|(message_id, name)| BookmarkRecord::new(message_id, name, ""))
}

// *For any* sequence of index updates, the index equals the last non-zero
// count per chat, never holds a zero count and never keeps an empty
// character.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn index_matches_last_count_per_chat(updates in prop::collection::vec(arb_update(), 0..60)) {
        let mut index = BookmarkIndex::new();
        let mut model: BTreeMap<(usize, String), usize> = BTreeMap::new();

        for (character_id, chat_id, count) in updates {
            index.update(Some(character_id), Some(&chat_id), count);
            if count == 0 {
                model.remove(&(character_id, chat_id));
            } else {
                model.insert((character_id, chat_id), count);
            }
        }

        let keys: Vec<(usize, String)> = index
            .keys()
            .into_iter()
            .map(|k| (k.character_id, k.chat_id))
            .collect();
        let expected: Vec<(usize, String)> = model.keys().cloned().collect();
        prop_assert_eq!(keys, expected);

        for ((character_id, chat_id), count) in &model {
            let entry = index.entry(&ChatKey::new(*character_id, chat_id));
            prop_assert_eq!(entry.map(|e| e.count), Some(*count));
        }

        let summary = index.summary();
        prop_assert_eq!(summary.chats, model.len());
        prop_assert_eq!(summary.bookmarks, model.values().sum::<usize>());
        for character_id in index.character_ids() {
            prop_assert!(index.chats_of(character_id).count() > 0);
        }
    }

    // Merging is idempotent and never lets a duplicate in.
    #[test]
    fn merge_is_idempotent(
        existing in prop::collection::vec(arb_record(), 0..8),
        incoming in prop::collection::vec(arb_record(), 0..12),
    ) {
        let mut dest = Vec::new();
        merge_into(&mut dest, &existing);

        let first = merge_into(&mut dest, &incoming);
        prop_assert_eq!(first.imported + first.duplicated, incoming.len());
        let len = dest.len();

        let second = merge_into(&mut dest, &incoming);
        prop_assert_eq!(second.imported, 0);
        prop_assert_eq!(dest.len(), len);

        for (i, a) in dest.iter().enumerate() {
            for b in &dest[i + 1..] {
                prop_assert!(!is_duplicate(a, b));
            }
        }
        prop_assert!(dest.windows(2).all(|w| w[0].message_id <= w[1].message_id));
    }
}
