// Chat bookmark shared type definitions
// Each submodule defines types used across the stores, engines and hosts.

pub mod bookmark;
pub mod chat;
pub mod errors;
pub mod export;
pub mod index;
pub mod settings;
