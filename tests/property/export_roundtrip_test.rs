//! Property-based tests for export files read back by the importer.
//!
//! Whatever the exporter writes, the importer must accept, and importing it
//! into the chats it came from must find nothing new.

use chat_bookmarks::services::export_engine::{build_v2, build_v3};
use chat_bookmarks::types::bookmark::{merge_into, BookmarkRecord};
use chat_bookmarks::types::export::{
    CharacterExport, ChatExport, ExportPayload, ExportV1, ImportPayload,
};
use proptest::prelude::*;

fn arb_record() -> impl Strategy<Value = BookmarkRecord> {
    (-5i64..200, "[a-zA-Z][a-zA-Z0-9 ]{0,10}", "[a-z ]{0,16}")
        .prop_map(|(message_id, name, description)| BookmarkRecord::new(message_id, &name, &description))
}

fn arb_chat() -> impl Strategy<Value = ChatExport> {
    ("[a-z]{1,8}", prop::collection::vec(arb_record(), 0..6), any::<bool>()).prop_map(
        |(file_name, bookmarks, current)| ChatExport {
            chat_name: file_name.clone(),
            file_name,
            bookmarks,
            is_current: current.then_some(true),
        },
    )
}

fn arb_character() -> impl Strategy<Value = CharacterExport> {
    ("[A-Z][a-z]{1,8}", 0usize..10, prop::collection::vec(arb_chat(), 0..4)).prop_map(
        |(character_name, character_id, chats)| CharacterExport {
            avatar: format!("{}.png", character_name),
            character_name,
            character_id,
            chats,
        },
    )
}

fn reimport(payload: &ExportPayload) -> ImportPayload {
    let text = payload.to_json_pretty().expect("export serializes");
    ImportPayload::parse(&text).expect("own export must be importable")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn v1_export_reimports_as_all_duplicates(records in prop::collection::vec(arb_record(), 0..10)) {
        let mut chat = Vec::new();
        merge_into(&mut chat, &records);

        let payload = ExportPayload::V1(ExportV1 { bookmarks: chat.clone() });
        let ImportPayload::Legacy(incoming) = reimport(&payload) else {
            return Err(TestCaseError::fail("v1 export must decode as legacy"));
        };

        let count = merge_into(&mut chat, &incoming);
        prop_assert_eq!(count.imported, 0);
        prop_assert_eq!(count.duplicated, incoming.len());
    }

    #[test]
    fn v2_export_keeps_groups_and_fields(chats in prop::collection::vec(arb_chat(), 0..5)) {
        let payload = ExportPayload::V2(build_v2(chats.clone()));
        let ImportPayload::PerChat(groups) = reimport(&payload) else {
            return Err(TestCaseError::fail("v2 export must decode as per-chat"));
        };

        prop_assert_eq!(groups.len(), chats.len());
        for (group, chat) in groups.iter().zip(&chats) {
            prop_assert_eq!(&group.file_name, &chat.file_name);
            prop_assert_eq!(group.is_current, chat.is_current == Some(true));
            prop_assert_eq!(group.bookmarks.len(), chat.bookmarks.len());
            for (incoming, original) in group.bookmarks.iter().zip(&chat.bookmarks) {
                prop_assert_eq!(incoming.message_id, original.message_id);
                prop_assert_eq!(&incoming.name, &original.name);
                prop_assert_eq!(&incoming.description, &original.description);
                prop_assert_eq!(&incoming.created_at, &original.created_at);
                prop_assert_ne!(&incoming.id, &original.id);
            }
        }
    }

    #[test]
    fn v3_export_totals_match_decoded_content(characters in prop::collection::vec(arb_character(), 0..4)) {
        let payload = ExportPayload::V3(build_v3(characters.clone()));
        let total = payload.total_bookmarks();
        let ImportPayload::PerCharacter(decoded) = reimport(&payload) else {
            return Err(TestCaseError::fail("v3 export must decode as per-character"));
        };

        let decoded_total: usize = decoded
            .iter()
            .flat_map(|c| &c.chats)
            .map(|chat| chat.bookmarks.len())
            .sum();
        prop_assert_eq!(decoded_total, total);
        let names: Vec<&str> = decoded.iter().map(|c| c.character_name.as_str()).collect();
        let expected: Vec<&str> = characters.iter().map(|c| c.character_name.as_str()).collect();
        prop_assert_eq!(names, expected);
    }
}
