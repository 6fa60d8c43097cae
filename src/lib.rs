//! chat-bookmarks: named bookmarks on chat messages, stored inside each
//! chat's own metadata, with a cross-chat index, import/export and erase.
//!
//! This library crate exposes all modules for use by the binary and integration tests.

pub mod app;
pub mod config;
pub mod host;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod types;
