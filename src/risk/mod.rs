//! 风险分类器
//!
//! 纯函数：PlannedAction × ToolSpec × RiskConfig → RiskClass。
//! 基准为工具声明的等级；配置只能抬升（conservative_mode、按工具 escalate），
//! 绝不把 DESTRUCTIVE 降为更低等级。相同输入恒返回相同结果。

use std::collections::HashMap;

use crate::plan::PlannedAction;
use crate::tools::{RiskClass, ToolSpec};

/// 风险分类配置：由编排器构造时显式传入，不依赖进程级可变状态
#[derive(Clone, Debug, Default)]
pub struct RiskConfig {
    /// 保守模式：SAFE 动作也抬升为 SENSITIVE，进入审批门
    pub conservative_mode: bool,
    /// 按工具名抬升等级（只取声明值与该值中较高者）
    pub escalate: HashMap<String, RiskClass>,
}

/// 风险分类器
#[derive(Clone, Debug, Default)]
pub struct RiskClassifier {
    config: RiskConfig,
}

impl RiskClassifier {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// 分类单个计划动作。等级只升不降：取声明值、escalate 覆盖、保守模式抬升三者的最大值
    pub fn classify(&self, action: &PlannedAction, spec: &ToolSpec) -> RiskClass {
        let mut level = spec.risk_class;

        if let Some(&forced) = self.config.escalate.get(&action.tool) {
            level = level.max(forced);
        }

        if self.config.conservative_mode {
            level = level.max(RiskClass::Sensitive);
        }

        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolSchema;
    use serde_json::json;

    fn action(tool: &str) -> PlannedAction {
        PlannedAction {
            index: 0,
            tool: tool.to_string(),
            args: json!({}),
            rationale: String::new(),
            depends_on: vec![],
        }
    }

    fn spec(name: &str, risk: RiskClass) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: String::new(),
            risk_class: risk,
            schema: ToolSchema::empty(),
        }
    }

    #[test]
    fn test_base_level_is_declared_class() {
        let c = RiskClassifier::default();
        assert_eq!(
            c.classify(&action("a"), &spec("a", RiskClass::Safe)),
            RiskClass::Safe
        );
        assert_eq!(
            c.classify(&action("a"), &spec("a", RiskClass::Destructive)),
            RiskClass::Destructive
        );
    }

    #[test]
    fn test_conservative_mode_escalates_safe() {
        let c = RiskClassifier::new(RiskConfig {
            conservative_mode: true,
            ..Default::default()
        });
        assert_eq!(
            c.classify(&action("a"), &spec("a", RiskClass::Safe)),
            RiskClass::Sensitive
        );
        // DESTRUCTIVE 不受影响
        assert_eq!(
            c.classify(&action("a"), &spec("a", RiskClass::Destructive)),
            RiskClass::Destructive
        );
    }

    #[test]
    fn test_escalate_override_never_lowers() {
        let mut escalate = HashMap::new();
        escalate.insert("a".to_string(), RiskClass::Safe);
        let c = RiskClassifier::new(RiskConfig {
            conservative_mode: false,
            escalate,
        });
        // 覆盖值低于声明值时以声明值为准
        assert_eq!(
            c.classify(&action("a"), &spec("a", RiskClass::Destructive)),
            RiskClass::Destructive
        );
    }

    #[test]
    fn test_escalate_override_raises() {
        let mut escalate = HashMap::new();
        escalate.insert("a".to_string(), RiskClass::Destructive);
        let c = RiskClassifier::new(RiskConfig {
            conservative_mode: false,
            escalate,
        });
        assert_eq!(
            c.classify(&action("a"), &spec("a", RiskClass::Safe)),
            RiskClass::Destructive
        );
    }

    #[test]
    fn test_deterministic() {
        let c = RiskClassifier::new(RiskConfig {
            conservative_mode: true,
            ..Default::default()
        });
        let a = action("a");
        let s = spec("a", RiskClass::Sensitive);
        let first = c.classify(&a, &s);
        for _ in 0..10 {
            assert_eq!(c.classify(&a, &s), first);
        }
    }
}
