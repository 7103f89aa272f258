//! 记忆层：短期缓存、长期存储（SQLite / JSON 文档）、按对话绑定的双层门面

pub mod cache;
pub mod conversation;
pub mod document;
pub mod facade;
pub mod sqlite;
pub mod store;

pub use cache::ShortTermCache;
pub use conversation::{now_timestamp, record_timestamp, Message, Role, Turn};
pub use document::JsonFileStore;
pub use facade::MemoryFacade;
pub use sqlite::SqliteStore;
pub use store::{record_identity, record_matches, MemoryRecord, MemoryStore};
