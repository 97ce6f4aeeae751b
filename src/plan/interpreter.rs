//! 计划解释与整体校验
//!
//! 从 LLM 文本中提取 JSON（```json 围栏或最外层花括号），反序列化为线格式
//! {"reasoning": "...", "plan": [{"step", "tool", "input", "depends_on"}]}，
//! 再整体校验：工具存在、参数符合 Schema、依赖只指向更早的动作。
//! 任何一项不过则整个计划作废，不产生任何派发。无副作用。

use std::collections::HashSet;
use std::sync::Arc;

use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::Value;

use crate::core::AgentError;
use crate::tools::ToolRegistry;

/// 提供方线格式：单步
#[derive(Debug, Deserialize, JsonSchema)]
struct RawStep {
    /// 1 起始的步骤号（仅用于提示词示例，解析后以数组下标为准）
    #[serde(default)]
    #[allow(dead_code)]
    step: Option<u32>,
    /// 工具名
    tool: String,
    /// 工具参数
    #[serde(default)]
    input: Value,
    /// 选择该步骤的理由
    #[serde(default)]
    rationale: String,
    /// 依赖的更早步骤下标（0 起始）
    #[serde(default)]
    depends_on: Vec<usize>,
    /// 提供方自报的审批标记：解析后忽略，风险只由分类器裁定
    #[serde(default)]
    #[allow(dead_code)]
    requires_approval: Option<bool>,
}

/// 提供方线格式：整体回复
#[derive(Debug, Deserialize, JsonSchema)]
struct RawPlan {
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    plan: Vec<RawStep>,
}

/// 规划输出线格式的 JSON Schema，拼入规划 prompt 以减少格式错误
pub fn plan_format_schema_json() -> String {
    let schema = schema_for!(RawPlan);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| String::new())
}

/// 经校验的单个计划动作
#[derive(Clone, Debug)]
pub struct PlannedAction {
    /// 计划内唯一序号（数组下标）
    pub index: usize,
    pub tool: String,
    pub args: Value,
    pub rationale: String,
    /// 必须全部 SUCCEEDED 后才可派发的前置动作下标
    pub depends_on: Vec<usize>,
}

/// 一轮的动作计划，仅存活于单次编排周期
#[derive(Clone, Debug, Default)]
pub struct ActionPlan {
    pub actions: Vec<PlannedAction>,
}

impl ActionPlan {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// 解释结果：推理轨迹 + 计划（计划可为空，表示纯分析轮）
#[derive(Clone, Debug)]
pub struct InterpretedPlan {
    pub reasoning: String,
    pub plan: ActionPlan,
}

/// 计划解释器：持有注册表引用以校验工具与参数
pub struct PlanInterpreter {
    registry: Arc<ToolRegistry>,
}

impl PlanInterpreter {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// 解释一段提供方输出。完全没有 JSON 时视为纯分析轮（全文为 reasoning，计划为空）；
    /// 有 JSON 但解析或校验失败则整体报错，调用方转为解释性回复。
    pub fn interpret(&self, output: &str) -> Result<InterpretedPlan, AgentError> {
        let Some(json_str) = extract_json(output) else {
            return Ok(InterpretedPlan {
                reasoning: output.trim().to_string(),
                plan: ActionPlan::default(),
            });
        };

        let raw: RawPlan = serde_json::from_str(json_str)
            .map_err(|e| AgentError::MalformedPlan(format!("invalid plan JSON: {e}")))?;

        let mut actions = Vec::with_capacity(raw.plan.len());
        for (index, step) in raw.plan.into_iter().enumerate() {
            let spec = self
                .registry
                .spec(&step.tool)
                .ok_or_else(|| AgentError::UnknownTool(step.tool.clone()))?;

            spec.schema
                .validate(&step.input)
                .map_err(|detail| AgentError::SchemaMismatch {
                    tool: step.tool.clone(),
                    detail,
                })?;

            let mut seen = HashSet::new();
            for &dep in &step.depends_on {
                // 只允许指向更早的动作：前向引用与自引用都会构成环，整体作废
                if dep >= index {
                    return Err(AgentError::MalformedPlan(format!(
                        "step {index} depends on step {dep}, which is not an earlier step"
                    )));
                }
                if !seen.insert(dep) {
                    return Err(AgentError::MalformedPlan(format!(
                        "step {index} declares duplicate dependency {dep}"
                    )));
                }
            }

            actions.push(PlannedAction {
                index,
                tool: step.tool,
                args: step.input,
                rationale: step.rationale,
                depends_on: step.depends_on,
            });
        }

        Ok(InterpretedPlan {
            reasoning: raw.reasoning,
            plan: ActionPlan { actions },
        })
    }
}

/// 从文本中提取 JSON 块（```json ... ``` 或最外层花括号）
fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(match rest.find("```") {
            Some(end) => rest[..end].trim(),
            None => rest.trim(),
        });
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&trimmed[start..=end])
}
