//! Echo 工具（测试用）

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{FieldKind, Tool, ToolSchema};

/// Echo 工具：回显文本
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text (for testing). Args: {\"text\": \"message\"}"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty().field("text", FieldKind::String, true, "text to echo")
    }

    async fn invoke(&self, args: Value) -> Result<Value, String> {
        let text = args
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("(empty)");
        Ok(Value::String(text.to_string()))
    }
}
