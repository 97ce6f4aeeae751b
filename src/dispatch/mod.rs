//! 工具派发器：依赖偏序 + 风险门控下的有界并发执行

pub mod dispatcher;
pub mod record;

pub use dispatcher::{DispatchConfig, ToolDispatcher};
pub use record::{ActionRecord, ActionStatus, SkipReason};
