//! 会话层：消息模型与存储（内存 / SQLite）

pub mod message;
pub mod store;

pub use message::{HandoffNote, Message, Role, ToolCallRecord};
pub use store::{
    create_session_store, MemorySessionStore, Session, SessionMeta, SessionStore,
    SqliteSessionStore,
};
