//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WASP__*` 覆盖（双下划线表示嵌套，
//! 如 `WASP__APPROVAL__TIMEOUT_SECS=600`）。

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::RetryPolicy;
use crate::dispatch::DispatchConfig;
use crate::risk::RiskConfig;
use crate::session::ContextConfig;
use crate::tools::RiskClass;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub provider: ProviderSection,
    pub orchestrator: OrchestratorSection,
    pub approval: ApprovalSection,
    pub risk: RiskSection,
}

/// [app] 段：应用名与会话上下文
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 未知会话是否自动创建
    pub auto_create_sessions: bool,
    /// 送入提供方的历史消息条数上限
    pub max_context_messages: usize,
    /// 历史消息总字符预算
    pub context_char_budget: usize,
    /// 会话落盘目录；未设置时用内存存储
    pub session_dir: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            auto_create_sessions: true,
            max_context_messages: 20,
            context_char_budget: 16_000,
            session_dir: None,
        }
    }
}

/// [provider] 段：推理提供方
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    pub model: String,
    /// OpenAI 兼容端点；未设置时用官方端点
    pub base_url: Option<String>,
    pub retry: RetrySection,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            retry: RetrySection::default(),
        }
    }
}

/// [provider.retry] 段：瞬时错误重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

/// [orchestrator] 段：派发约束
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    pub max_concurrent_tools: usize,
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// 计划级超时（秒）：到点后强制过期所有待审批请求
    pub plan_deadline_secs: u64,
    /// 互斥组：组名 → 工具名列表，同组工具串行执行
    pub serialize_groups: HashMap<String, Vec<String>>,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_concurrent_tools: 3,
            tool_timeout_secs: 30,
            plan_deadline_secs: 120,
            serialize_groups: HashMap::new(),
        }
    }
}

/// [approval] 段：审批门
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApprovalSection {
    /// 单个审批请求超时（秒），超时即 EXPIRED
    pub timeout_secs: u64,
    /// SENSITIVE 自动批准；对 DESTRUCTIVE 无效
    pub auto_approve_sensitive: bool,
}

impl Default for ApprovalSection {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            auto_approve_sensitive: false,
        }
    }
}

impl ApprovalSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// [risk] 段：风险分类
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RiskSection {
    /// 保守模式：SAFE 也抬升为 SENSITIVE
    pub conservative_mode: bool,
    /// 按工具名抬升等级，如 `web_search = "sensitive"`
    pub escalate: HashMap<String, RiskClass>,
}

impl AppConfig {
    pub fn context_config(&self) -> ContextConfig {
        ContextConfig {
            max_context_messages: self.app.max_context_messages,
            context_char_budget: self.app.context_char_budget,
            auto_create_sessions: self.app.auto_create_sessions,
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            max_concurrent_tools: self.orchestrator.max_concurrent_tools,
            tool_timeout: Duration::from_secs(self.orchestrator.tool_timeout_secs),
            plan_deadline: Duration::from_secs(self.orchestrator.plan_deadline_secs),
            serialize_groups: self.orchestrator.serialize_groups.clone(),
        }
    }

    pub fn risk_config(&self) -> RiskConfig {
        RiskConfig {
            conservative_mode: self.risk.conservative_mode,
            escalate: self.risk.escalate.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.provider.retry.max_attempts,
            base_delay: Duration::from_millis(self.provider.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.provider.retry.max_delay_ms),
        }
    }
}

/// 从 config 目录加载配置，环境变量 WASP__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WASP__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WASP")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
