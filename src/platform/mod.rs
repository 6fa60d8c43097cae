// Platform data directory
// Where the filesystem host keeps chats, characters, settings and config
// when no explicit data dir is configured.

use std::path::PathBuf;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

pub const APP_DIR_NAME: &str = "chat-bookmarks";

/// Returns the platform-specific data directory.
///
/// - **Linux**: `$XDG_DATA_HOME/chat-bookmarks` or `~/.local/share/chat-bookmarks`
/// - **macOS**: `~/Library/Application Support/chat-bookmarks`
/// - **Windows**: `%APPDATA%/chat-bookmarks`
pub fn get_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        linux::get_data_dir()
    }
    #[cfg(target_os = "macos")]
    {
        macos::get_data_dir()
    }
    #[cfg(target_os = "windows")]
    {
        windows::get_data_dir()
    }
}
