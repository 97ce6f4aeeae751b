//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / risk_class / schema / invoke），
//! 由 ToolRegistry 按名注册与查找；进程启动时注册完毕，此后只读，可跨并发轮次以 Arc 共享。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::ToolSchema;

/// 工具声明的风险等级：SAFE 直接执行，SENSITIVE / DESTRUCTIVE 需人工审批，
/// DESTRUCTIVE 在任何配置下都不可自动批准
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskClass {
    Safe,
    Sensitive,
    Destructive,
}

impl RiskClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskClass::Safe => "safe",
            RiskClass::Sensitive => "sensitive",
            RiskClass::Destructive => "destructive",
        }
    }
}

/// 工具 trait：名称、描述（供 LLM 理解）、风险等级、参数 Schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（用于计划 JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 声明的风险等级，风险分类的基准输入
    fn risk_class(&self) -> RiskClass {
        RiskClass::Safe
    }

    /// 参数 Schema，派发前做结构化校验
    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
    }

    /// 执行工具
    async fn invoke(&self, args: Value) -> Result<Value, String>;
}

/// 工具元信息快照：注册表之外（解释器 / 分类器）只依赖这份只读数据
#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub risk_class: RiskClass,
    pub schema: ToolSchema,
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，支持 register / get / spec / catalog_json
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// 工具元信息快照
    pub fn spec(&self, name: &str) -> Option<ToolSpec> {
        self.tools.get(name).map(|t| ToolSpec {
            name: t.name().to_string(),
            description: t.description().to_string(),
            risk_class: t.risk_class(),
            schema: t.schema(),
        })
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 生成工具目录 JSON（name / description / risk / parameters），拼入规划 prompt
    pub fn catalog_json(&self) -> String {
        let mut entries: Vec<Value> = self
            .tools
            .values()
            .map(|t| {
                serde_json::json!({
                    "name": t.name(),
                    "description": t.description(),
                    "risk": t.risk_class().as_str(),
                    "parameters": t.schema().to_json(),
                })
            })
            .collect();
        // HashMap 遍历无序，按名排序保证 prompt 稳定
        entries.sort_by(|a, b| {
            a.get("name")
                .and_then(Value::as_str)
                .cmp(&b.get("name").and_then(Value::as_str))
        });
        serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
    }
}
