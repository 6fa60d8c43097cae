use chat_bookmarks::types::errors::*;

// === BookmarkError Tests ===

#[test]
fn bookmark_error_display_variants() {
    assert_eq!(
        BookmarkError::ContextUnavailable("no active chat".to_string()).to_string(),
        "Chat context unavailable: no active chat"
    );
    assert_eq!(
        BookmarkError::InvalidName("name must not be empty".to_string()).to_string(),
        "Invalid bookmark name: name must not be empty"
    );
}

#[test]
fn bookmark_error_implements_error_trait() {
    let err: Box<dyn std::error::Error> = Box::new(BookmarkError::InvalidName("blank".to_string()));
    assert!(err.source().is_none());
}

#[test]
fn host_and_settings_errors_convert_to_persistence_errors() {
    let from_host: BookmarkError = HostError::IoError("disk full".to_string()).into();
    assert!(matches!(from_host, BookmarkError::PersistenceError(ref m) if m.contains("disk full")));

    let from_settings: BookmarkError = SettingsError::IoError("denied".to_string()).into();
    assert_eq!(
        from_settings.to_string(),
        "Bookmark persistence error: Settings I/O error: denied"
    );
}

// === HostError Tests ===

#[test]
fn host_error_only_unavailable_is_unavailable() {
    assert!(HostError::Unavailable("down".to_string()).is_unavailable());
    assert!(!HostError::NotFound("c".to_string()).is_unavailable());
    assert!(!HostError::Rejected("500".to_string()).is_unavailable());
}

#[test]
fn host_error_display_variants() {
    assert_eq!(
        HostError::NotFound("Alice/c1".to_string()).to_string(),
        "Chat not found: Alice/c1"
    );
    assert_eq!(
        HostError::Rejected("HTTP 500".to_string()).to_string(),
        "Chat storage rejected request: HTTP 500"
    );
}

// === ImportError Tests ===

#[test]
fn import_error_malformed_record_names_path() {
    let err = ImportError::MalformedRecord(
        "chatBookmarks[0].bookmarks[2].messageId".to_string(),
        "expected an integer".to_string(),
    );
    assert_eq!(
        err.to_string(),
        "Malformed import record at chatBookmarks[0].bookmarks[2].messageId: expected an integer"
    );
}

#[test]
fn config_error_display() {
    assert_eq!(
        ConfigError::InvalidValue("log_level".to_string()).to_string(),
        "Invalid config value: log_level"
    );
}
