//! 有界指数退避重试
//!
//! 只重试瞬时错误（AgentError::is_transient）；校验类错误与显式拒绝原样上抛。
//! 重试耗尽后收敛为 UpstreamUnavailable。

use std::future::Future;
use std::time::Duration;

use crate::core::AgentError;

/// 重试策略：次数上限 + 指数退避（base * 2^n，封顶 max_delay）
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// 执行 op；每次调用 f 产生一个新的尝试
    pub async fn run<T, F, Fut>(&self, op: &str, mut f: F) -> Result<T, AgentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut delay = self.base_delay;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= max_attempts => {
                    return Err(AgentError::UpstreamUnavailable(format!("{op}: {e}")));
                }
                Err(e) => {
                    tracing::warn!(op, attempt, error = %e, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.max_delay);
                }
            }
        }
    }
}
