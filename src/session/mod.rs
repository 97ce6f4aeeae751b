//! 会话层：消息类型、存储实现与上下文装配

pub mod context;
pub mod file;
pub mod message;
pub mod store;

pub use context::{ContextConfig, SessionContextManager};
pub use file::FileSessionStore;
pub use message::{Message, Role, Session, TurnPayload};
pub use store::{MemorySessionStore, SessionStore};
