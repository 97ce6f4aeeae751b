//! 云资源工具（模拟实现）
//!
//! cloud_resources 查询 EC2 / Lambda / S3 资源清单；cloud_mutate 变更实例状态。
//! 真实云端调用不在本 crate 范围内，这里返回固定样例数据，供演示与测试。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::{FieldKind, RiskClass, Tool, ToolSchema};

/// 云资源查询工具：list ec2 / lambda / s3
pub struct CloudResourcesTool;

#[async_trait]
impl Tool for CloudResourcesTool {
    fn name(&self) -> &str {
        "cloud_resources"
    }

    fn description(&self) -> &str {
        "Query cloud infrastructure (EC2 instances, Lambda functions, S3 buckets). \
         Args: {\"action\": \"list\", \"service\": \"ec2\"|\"lambda\"|\"s3\"}"
    }

    // 资源清单含内部拓扑信息，归为 SENSITIVE
    fn risk_class(&self) -> RiskClass {
        RiskClass::Sensitive
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
            .field("action", FieldKind::String, true, "only 'list' is supported")
            .field("service", FieldKind::String, true, "ec2 | lambda | s3")
            .field("resource_id", FieldKind::String, false, "specific resource id")
    }

    async fn invoke(&self, args: Value) -> Result<Value, String> {
        let action = args
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        let service = args
            .get("service")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();

        // 常见同义动作归一为 list
        if !matches!(action.as_str(), "list" | "describe" | "get") {
            return Err(format!("unsupported action '{action}', try action='list'"));
        }

        match service.as_str() {
            "ec2" => Ok(json!({
                "instances": [
                    {"id": "i-0a1b2c3d", "type": "t3.medium", "state": "running"},
                    {"id": "i-0e4f5a6b", "type": "m5.large", "state": "stopped"},
                ],
                "count": 2,
            })),
            "lambda" => Ok(json!({
                "functions": [
                    {"name": "ingest-events", "runtime": "python3.12", "memory": 256},
                ],
                "count": 1,
            })),
            "s3" => Ok(json!({
                "buckets": [
                    {"name": "app-artifacts"},
                    {"name": "app-logs"},
                ],
                "count": 2,
            })),
            other => Err(format!("unknown service '{other}', try ec2 / lambda / s3")),
        }
    }
}

/// 云资源变更工具：停止 / 终止实例（模拟），声明为 DESTRUCTIVE
pub struct CloudMutateTool;

#[async_trait]
impl Tool for CloudMutateTool {
    fn name(&self) -> &str {
        "cloud_mutate"
    }

    fn description(&self) -> &str {
        "Change cloud resource state (stop/terminate an EC2 instance). \
         Args: {\"action\": \"stop\"|\"terminate\", \"resource_id\": \"i-...\"}"
    }

    fn risk_class(&self) -> RiskClass {
        RiskClass::Destructive
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
            .field("action", FieldKind::String, true, "stop | terminate")
            .field("resource_id", FieldKind::String, true, "instance id")
    }

    async fn invoke(&self, args: Value) -> Result<Value, String> {
        let action = args
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let id = args
            .get("resource_id")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !matches!(action, "stop" | "terminate") {
            return Err(format!("unsupported action '{action}'"));
        }
        Ok(json!({
            "resource_id": id,
            "action": action,
            "state": if action == "stop" { "stopping" } else { "shutting-down" },
        }))
    }
}
