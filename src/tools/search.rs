//! Web 搜索工具（模拟实现）

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::{FieldKind, Tool, ToolSchema};

/// Web 搜索：返回固定样例结果，真实检索不在本 crate 范围内
pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for documentation and solutions. Args: {\"query\": \"...\"}"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty().field("query", FieldKind::String, true, "search query")
    }

    async fn invoke(&self, args: Value) -> Result<Value, String> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(json!({
            "results": [
                {
                    "title": format!("Result for: {query}"),
                    "url": "https://example.com",
                    "snippet": "Relevant information about the query...",
                }
            ],
        }))
    }
}
