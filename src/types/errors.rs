use thiserror::Error;

// === BookmarkError ===

/// Errors related to the active chat's bookmark store.
#[derive(Debug, Error)]
pub enum BookmarkError {
    /// No active chat, or the host has no metadata for it.
    #[error("Chat context unavailable: {0}")]
    ContextUnavailable(String),
    /// Bookmark names must not be blank.
    #[error("Invalid bookmark name: {0}")]
    InvalidName(String),
    /// Stored bookmark data could not be read or written.
    #[error("Bookmark serialization error: {0}")]
    SerializationError(String),
    /// The host failed to persist data.
    #[error("Bookmark persistence error: {0}")]
    PersistenceError(String),
}

// === HostError ===

/// Errors reported by host collaborators (chat storage, persistence primitives).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HostError {
    /// The requested chat or character does not exist.
    #[error("Chat not found: {0}")]
    NotFound(String),
    /// The storage backend could not be reached at all.
    #[error("Chat storage unavailable: {0}")]
    Unavailable(String),
    /// The backend answered with a non-success status.
    #[error("Chat storage rejected request: {0}")]
    Rejected(String),
    /// A local file operation failed.
    #[error("Chat storage I/O error: {0}")]
    IoError(String),
    /// Chat content could not be encoded or decoded.
    #[error("Chat storage serialization error: {0}")]
    SerializationError(String),
}

impl HostError {
    /// Whether the whole backend is gone, as opposed to one chat failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, HostError::Unavailable(_))
    }
}

// === ImportError ===

/// Errors that abort an import before anything is merged.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The payload is not valid JSON.
    #[error("Import parse error: {0}")]
    ParseError(String),
    /// The payload's shape or version is not one we understand.
    #[error("Unsupported import format: {0}")]
    UnsupportedFormat(String),
    /// A field failed validation; the first value names the JSON path.
    #[error("Malformed import record at {0}: {1}")]
    MalformedRecord(String, String),
    /// The import needs an active chat and there is none.
    #[error("Import requires an active chat: {0}")]
    ContextUnavailable(String),
}

// === SettingsError ===

/// Errors related to settings persistence.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
}

// === ConfigError ===

/// Errors raised while assembling runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Config I/O error: {0}")]
    IoError(String),
    /// The config file is not valid.
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// A value is present but unusable.
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

impl From<SettingsError> for BookmarkError {
    fn from(e: SettingsError) -> Self {
        BookmarkError::PersistenceError(e.to_string())
    }
}

impl From<HostError> for BookmarkError {
    fn from(e: HostError) -> Self {
        BookmarkError::PersistenceError(e.to_string())
    }
}
