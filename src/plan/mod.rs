//! 计划解释器：将推理提供方的自由文本输出解析为经校验的 ActionPlan

pub mod interpreter;

pub use interpreter::{
    plan_format_schema_json, ActionPlan, InterpretedPlan, PlanInterpreter, PlannedAction,
};
