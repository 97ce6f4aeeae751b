//! 推理提供方：抽象、OpenAI 兼容实现、Mock 与提示词

pub mod mock;
pub mod openai;
pub mod prompts;
pub mod traits;

pub use mock::MockProvider;
pub use openai::{OpenAiProvider, TokenUsage};
pub use prompts::{fallback_summary, planning_system_prompt, synthesis_prompt};
pub use traits::ReasoningProvider;
