//! 推理提供方抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 ReasoningProvider：输入消息序列，输出自由文本
//! （规划轮含结构化计划 JSON，综合轮为最终回复）。提供方内部不做任何计划校验。

use async_trait::async_trait;

use crate::session::Message;

/// 推理提供方：complete 为非流式完成；错误以 String 返回，编排器统一判定是否重试
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
