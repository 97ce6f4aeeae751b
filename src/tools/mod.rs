//! 工具箱：Tool trait、注册表、参数 Schema 与内置模拟工具

pub mod cloud;
pub mod cost;
pub mod echo;
pub mod registry;
pub mod schema;
pub mod search;

pub use cloud::{CloudMutateTool, CloudResourcesTool};
pub use cost::CostAnalysisTool;
pub use echo::EchoTool;
pub use registry::{RiskClass, Tool, ToolRegistry, ToolSpec};
pub use schema::{FieldKind, FieldSpec, ToolSchema};
pub use search::WebSearchTool;
