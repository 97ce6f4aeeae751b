//! 动作记录：每个计划动作恰好一条终态记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 动作终态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Succeeded,
    Failed,
    /// 审批被人工拒绝
    Rejected,
    /// 未派发即跳过（依赖失败 / 审批过期 / 计划超时）
    Skipped,
    /// 轮次取消时尚未到达终态
    Cancelled,
}

impl ActionStatus {
    /// 下游依赖判定：只有 SUCCEEDED 允许依赖方派发
    pub fn unblocks_dependents(&self) -> bool {
        matches!(self, ActionStatus::Succeeded)
    }
}

/// 跳过原因（可观测性：EXPIRED 与 REJECTED 派发后果相同，但记录中区分）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    DependencyFailed,
    ApprovalExpired,
    ApprovalRejected,
    Cancelled,
}

/// 一次派发动作的结果，随 assistant 消息落盘后不可变
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionRecord {
    pub index: usize,
    pub tool: String,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ActionRecord {
    pub fn succeeded(index: usize, tool: &str, output: Value, started_at: DateTime<Utc>) -> Self {
        Self {
            index,
            tool: tool.to_string(),
            status: ActionStatus::Succeeded,
            output: Some(output),
            error: None,
            skip_reason: None,
            started_at: Some(started_at),
            finished_at: Some(Utc::now()),
        }
    }

    pub fn failed(index: usize, tool: &str, error: String, started_at: DateTime<Utc>) -> Self {
        Self {
            index,
            tool: tool.to_string(),
            status: ActionStatus::Failed,
            output: None,
            error: Some(error),
            skip_reason: None,
            started_at: Some(started_at),
            finished_at: Some(Utc::now()),
        }
    }

    pub fn rejected(index: usize, tool: &str, resolver: &str) -> Self {
        Self {
            index,
            tool: tool.to_string(),
            status: ActionStatus::Rejected,
            output: None,
            error: Some(format!("rejected by {resolver}")),
            skip_reason: Some(SkipReason::ApprovalRejected),
            started_at: None,
            finished_at: Some(Utc::now()),
        }
    }

    pub fn skipped(index: usize, tool: &str, reason: SkipReason) -> Self {
        Self {
            index,
            tool: tool.to_string(),
            status: ActionStatus::Skipped,
            output: None,
            error: None,
            skip_reason: Some(reason),
            started_at: None,
            finished_at: Some(Utc::now()),
        }
    }

    pub fn cancelled(index: usize, tool: &str) -> Self {
        Self {
            index,
            tool: tool.to_string(),
            status: ActionStatus::Cancelled,
            output: None,
            error: None,
            skip_reason: Some(SkipReason::Cancelled),
            started_at: None,
            finished_at: Some(Utc::now()),
        }
    }
}
