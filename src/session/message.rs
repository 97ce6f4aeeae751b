//! 会话与消息类型
//!
//! Session 仅追加消息，创建后不删除（保留策略由外部决定）；Message 一经创建不可变，
//! assistant 消息可携带 TurnPayload（推理轨迹 + 本轮全部动作记录）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dispatch::ActionRecord;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 一轮对话的结构化载荷：推理轨迹与动作记录，随 assistant 消息一起落盘
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnPayload {
    pub reasoning: String,
    pub records: Vec<ActionRecord>,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// 仅 assistant 消息携带：本轮推理轨迹与动作记录
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<TurnPayload>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            payload: None,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            payload: None,
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            payload: None,
            timestamp: Utc::now(),
        }
    }

    /// 附加本轮结构化载荷（assistant 消息用）
    pub fn with_payload(mut self, payload: TurnPayload) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// 会话：有序消息序列 + 创建/最近活动时间
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// 追加一条消息并刷新最近活动时间（Session 的唯一变更方式）
    pub fn push(&mut self, msg: Message) {
        self.last_activity = msg.timestamp;
        self.messages.push(msg);
    }
}
