//! 规划与综合提示词
//!
//! 规划 system prompt 注入工具目录与计划线格式的 JSON Schema；
//! 综合 prompt 注入推理轨迹与动作记录，让提供方生成面向用户的最终回复。

use crate::dispatch::ActionRecord;

/// 规划轮 system prompt：角色设定 + 工具目录 + 输出格式
pub fn planning_system_prompt(catalog_json: &str, plan_schema_json: &str) -> String {
    format!(
        "You are a DevOps intelligence agent. Analyze the user's request and produce \
an action plan using ONLY the tools listed below.\n\n\
Available tools:\n{catalog_json}\n\n\
Respond with a single JSON object matching this schema:\n{plan_schema_json}\n\n\
Rules:\n\
1. \"plan\" is an array of steps; each step names a registered tool and its input.\n\
2. \"depends_on\" lists 0-based indices of EARLIER steps whose output the step needs; \
independent steps must not declare dependencies.\n\
3. If no tool is needed, return an empty \"plan\" and put your answer in \"reasoning\".\n\
4. Never invent tool names or parameters."
    )
}

/// 综合轮 prompt：基于动作记录生成最终回复
pub fn synthesis_prompt(user_text: &str, reasoning: &str, records: &[ActionRecord]) -> String {
    let records_json =
        serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You are a DevOps intelligence agent. Write the final reply to the user.\n\n\
User request: {user_text}\n\n\
Your earlier reasoning: {reasoning}\n\n\
Actions taken (JSON records):\n{records_json}\n\n\
Summarize what was done and what the results mean. If any action was skipped, \
rejected or expired waiting for approval, state this clearly. Reply in plain text."
    )
}

/// 提供方综合失败时的兜底回复：直接罗列动作结果
pub fn fallback_summary(records: &[ActionRecord]) -> String {
    if records.is_empty() {
        return "I've processed your request; no actions were required.".to_string();
    }
    let mut lines = vec!["I've processed your request. Action results:".to_string()];
    for r in records {
        let detail = match (&r.error, &r.skip_reason) {
            (Some(e), _) => format!(" ({e})"),
            (None, Some(reason)) => format!(" ({reason:?})"),
            _ => String::new(),
        };
        lines.push(format!("- {}: {:?}{detail}", r.tool, r.status));
    }
    lines.join("\n")
}
