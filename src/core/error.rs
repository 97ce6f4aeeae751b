//! 编排核心错误类型
//!
//! 校验类错误（MalformedPlan / UnknownTool / SchemaMismatch）不重试，转为面向用户的解释文本；
//! 单动作失败隔离在 ActionRecord 中；仅会话查找与计划校验会短路整轮。
//! is_transient 决定 retry::RetryPolicy 是否重试。

use thiserror::Error;

/// 一轮编排中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 推理提供方输出未通过计划校验（JSON 损坏、前向/环状依赖等），整个计划作废
    #[error("Malformed plan: {0}")]
    MalformedPlan(String),

    /// 计划引用了注册表中不存在的工具
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// 计划参数与工具 Schema 不符
    #[error("Schema mismatch for tool '{tool}': {detail}")]
    SchemaMismatch { tool: String, detail: String },

    #[error("Tool invocation failed: {0}")]
    ToolInvocationFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Approval request expired")]
    ApprovalExpired,

    #[error("Approval request rejected")]
    ApprovalRejected,

    /// 同一审批请求的第二次 resolve，无任何状态变更
    #[error("Approval already resolved: {0}")]
    AlreadyResolved(String),

    #[error("Unknown approval request: {0}")]
    UnknownApproval(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// 同一会话已有在途轮次，本次提交被拒绝
    #[error("Session busy: {0}")]
    SessionBusy(String),

    /// 瞬时失败重试耗尽后的最终错误
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// 推理提供方调用失败（网络 / 超时 / 5xx），可重试
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// 存储读写失败，可重试
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Turn cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl AgentError {
    /// 是否为瞬时失败：仅网络类（提供方 / 存储）重试，校验类与显式拒绝一律不重试
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AgentError::ProviderError(_) | AgentError::StorageError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AgentError::ProviderError("timeout".into()).is_transient());
        assert!(AgentError::StorageError("io".into()).is_transient());
        assert!(!AgentError::MalformedPlan("bad".into()).is_transient());
        assert!(!AgentError::SessionBusy("s1".into()).is_transient());
        assert!(!AgentError::UpstreamUnavailable("gone".into()).is_transient());
    }
}
