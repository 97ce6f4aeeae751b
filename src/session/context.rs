//! 会话上下文管理
//!
//! 规划前：从会话历史装配推理输入，按条数与字符预算从最旧开始截断；
//! 派发后：persist_turn 一次性追加 user + assistant 消息（落盘点），
//! 崩溃在此之前不会留下半截轮次，编排器整轮重试而非中途续跑。

use std::sync::Arc;

use crate::core::AgentError;
use crate::session::{Message, Session, SessionStore};

/// 上下文装配配置
#[derive(Clone, Debug)]
pub struct ContextConfig {
    /// 送入推理提供方的历史消息条数上限
    pub max_context_messages: usize,
    /// 历史消息总字符预算，超出时最旧的先截掉
    pub context_char_budget: usize,
    /// 未知会话是否自动创建；关闭时报 SessionNotFound
    pub auto_create_sessions: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_messages: 20,
            context_char_budget: 16_000,
            auto_create_sessions: true,
        }
    }
}

/// 会话上下文管理器
pub struct SessionContextManager {
    store: Arc<dyn SessionStore>,
    config: ContextConfig,
}

impl SessionContextManager {
    pub fn new(store: Arc<dyn SessionStore>, config: ContextConfig) -> Self {
        Self { store, config }
    }

    /// 加载会话；未知会话按配置自动创建或报 SessionNotFound
    pub async fn load_session(&self, session_id: &str) -> Result<Session, AgentError> {
        match self
            .store
            .get_session(session_id)
            .await
            .map_err(AgentError::StorageError)?
        {
            Some(session) => Ok(session),
            None if self.config.auto_create_sessions => self
                .store
                .create_session(session_id)
                .await
                .map_err(AgentError::StorageError),
            None => Err(AgentError::SessionNotFound(session_id.to_string())),
        }
    }

    /// 历史窗口：最近 max_context_messages 条，再按字符预算从最旧一侧截断
    pub fn history_window(&self, session: &Session) -> Vec<Message> {
        let messages = &session.messages;
        let tail_start = messages.len().saturating_sub(self.config.max_context_messages);
        let mut window: Vec<Message> = messages[tail_start..].to_vec();

        let mut total: usize = window.iter().map(|m| m.content.chars().count()).sum();
        while window.len() > 1 && total > self.config.context_char_budget {
            let dropped = window.remove(0);
            total -= dropped.content.chars().count();
        }
        window
    }

    /// 落盘一轮：user 消息 + 携带推理轨迹与动作记录的 assistant 消息。
    /// 单次原子追加，失败时会话保持原样，整轮可安全重试
    pub async fn persist_turn(
        &self,
        session_id: &str,
        user: Message,
        assistant: Message,
    ) -> Result<(), AgentError> {
        self.store
            .append_messages(session_id, vec![user, assistant])
            .await
            .map_err(AgentError::StorageError)
    }
}
