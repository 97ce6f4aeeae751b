//! 核心：错误分类、重试策略与编排器

pub mod error;
pub mod orchestrator;
pub mod retry;

pub use error::AgentError;
pub use orchestrator::{create_provider, Orchestrator, TurnResult};
pub use retry::RetryPolicy;
