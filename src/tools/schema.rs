//! 工具参数 Schema：显式字段表与结构化校验
//!
//! 每个工具声明字段名 → 语义类型 + 必填标记，Plan Interpreter 在派发前按此结构校验参数，
//! 取代「任意 JSON 直接透传」的调用方式。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 字段语义类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl FieldKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
        }
    }
}

/// 单个参数字段声明
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub description: String,
}

/// 工具参数 Schema：字段声明列表
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolSchema {
    pub fields: Vec<FieldSpec>,
}

impl ToolSchema {
    /// 无参数工具
    pub fn empty() -> Self {
        Self::default()
    }

    /// 链式添加字段声明
    pub fn field(
        mut self,
        name: impl Into<String>,
        kind: FieldKind,
        required: bool,
        description: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            required,
            description: description.into(),
        });
        self
    }

    /// 结构化校验：args 必须为 JSON 对象，必填字段齐全且类型匹配；未声明的多余字段放行
    pub fn validate(&self, args: &Value) -> Result<(), String> {
        let obj = match args {
            Value::Object(map) => map,
            Value::Null if self.fields.iter().all(|f| !f.required) => return Ok(()),
            other => return Err(format!("args must be a JSON object, got: {other}")),
        };

        for field in &self.fields {
            match obj.get(&field.name) {
                Some(v) => {
                    if !field.kind.matches(v) {
                        return Err(format!(
                            "field '{}' expects {}, got: {v}",
                            field.name,
                            field.kind.name()
                        ));
                    }
                }
                None if field.required => {
                    return Err(format!("missing required field '{}'", field.name));
                }
                None => {}
            }
        }
        Ok(())
    }

    /// 生成可拼入工具目录的参数描述 JSON
    pub fn to_json(&self) -> Value {
        let params: Vec<Value> = self
            .fields
            .iter()
            .map(|f| {
                serde_json::json!({
                    "name": f.name,
                    "type": f.kind.name(),
                    "required": f.required,
                    "description": f.description,
                })
            })
            .collect();
        Value::Array(params)
    }
}
