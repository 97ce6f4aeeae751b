//! Mock 推理提供方（用于测试，无需 API）
//!
//! 按入队顺序吐出脚本化回复；脚本耗尽时回显最后一条 User 消息为空计划的纯分析回复。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::provider::ReasoningProvider;
use crate::session::{Message, Role};

/// Mock 提供方：脚本化回复队列
#[derive(Debug, Default)]
pub struct MockProvider {
    replies: Mutex<VecDeque<String>>,
    /// 记录收到的请求数（供测试断言重试次数等）
    calls: Mutex<usize>,
    /// 前 N 次调用直接报错（模拟瞬时故障）
    fail_first: Mutex<usize>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条脚本回复
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(reply.into());
        self
    }

    /// 前 n 次 complete 返回错误（测试重试路径）
    pub fn with_transient_failures(self, n: usize) -> Self {
        *self.fail_first.lock().unwrap() = n;
        self
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ReasoningProvider for MockProvider {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        *self.calls.lock().unwrap() += 1;

        {
            let mut fail = self.fail_first.lock().unwrap();
            if *fail > 0 {
                *fail -= 1;
                return Err("simulated transient failure".to_string());
            }
        }

        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return Ok(reply);
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(format!("Mock analysis of: {last_user}"))
    }
}
