//! 成本分析工具（模拟实现）

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::{FieldKind, Tool, ToolSchema};

/// 成本分析：按时间段返回总费用、头部服务与优化建议（样例数据）
pub struct CostAnalysisTool;

#[async_trait]
impl Tool for CostAnalysisTool {
    fn name(&self) -> &str {
        "cost_analysis"
    }

    fn description(&self) -> &str {
        "Analyze cloud costs for a time period and suggest optimizations. \
         Args: {\"time_period\": \"last_month\"|\"last_week\"|\"today\"}"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty().field(
            "time_period",
            FieldKind::String,
            true,
            "last_month | last_week | today",
        )
    }

    async fn invoke(&self, args: Value) -> Result<Value, String> {
        let period = args
            .get("time_period")
            .and_then(Value::as_str)
            .unwrap_or("last_month");
        Ok(json!({
            "time_period": period,
            "total_cost": 1250.50,
            "top_services": [
                {"service": "EC2", "cost": 450.25},
                {"service": "S3", "cost": 125.50},
                {"service": "Lambda", "cost": 75.00},
            ],
            "recommendations": [
                "Consider Reserved Instances for steady EC2 workloads",
                "Enable S3 Intelligent-Tiering",
            ],
        }))
    }
}
