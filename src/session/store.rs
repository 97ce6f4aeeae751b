//! 会话存储抽象
//!
//! 统一的按键读写接口，单会话粒度原子；内存实现供测试与默认运行，
//! 文件实现供跨进程恢复。错误以 String 返回，由上层统一转 AgentError。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::session::{Message, Session};

/// 会话存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 读取会话；不存在返回 Ok(None)
    async fn get_session(&self, id: &str) -> Result<Option<Session>, String>;

    /// 创建空会话；已存在时返回现有会话
    async fn create_session(&self, id: &str) -> Result<Session, String>;

    /// 追加一条消息；会话不存在时报错
    async fn append_message(&self, id: &str, message: Message) -> Result<(), String>;

    /// 原子追加一批消息：要么全部落下，要么一条不落。
    /// 一轮的 user + assistant 必须走这里，分两次 append_message 在重试下会产生半截轮次
    async fn append_messages(&self, id: &str, messages: Vec<Message>) -> Result<(), String>;
}

/// 内存会话存储
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_session(&self, id: &str) -> Result<Option<Session>, String> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn create_session(&self, id: &str) -> Result<Session, String> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions
            .entry(id.to_string())
            .or_insert_with(|| Session::new(id))
            .clone())
    }

    async fn append_message(&self, id: &str, message: Message) -> Result<(), String> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| format!("session not found: {id}"))?;
        session.push(message);
        Ok(())
    }

    async fn append_messages(&self, id: &str, messages: Vec<Message>) -> Result<(), String> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| format!("session not found: {id}"))?;
        for message in messages {
            session.push(message);
        }
        Ok(())
    }
}
