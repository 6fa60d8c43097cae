// Chat bookmark services
// Engines that work across chats: migration, collection, export, import and
// bulk erase, plus settings persistence and the coalescing write queue.

pub mod bulk_eraser;
pub mod collection_engine;
pub mod export_engine;
pub mod import_engine;
pub mod migrator;
pub mod settings_engine;
pub mod write_queue;
