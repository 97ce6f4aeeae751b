//! Wasp - Rust DevOps 智能体编排核心
//!
//! 一轮请求的生命周期：用户消息进入编排器，推理提供方产出结构化动作计划，
//! 解释器整体校验，分类器裁定每个动作的风险等级，非 SAFE 动作过审批门，
//! 派发器按依赖序有界并发执行，综合器生成最终回复，整轮一次性落盘。
//!
//! 模块地图：
//! - `core`：错误分类、重试策略、编排器（submit_turn 入口）
//! - `provider`：推理提供方抽象、OpenAI 兼容实现、Mock、提示词
//! - `plan`：LLM 输出提取、线格式反序列化与计划整体校验
//! - `risk`：纯函数风险分类（只升不降）
//! - `approval`：审批门状态机（PENDING → APPROVED/REJECTED/EXPIRED，恰好一次决议）
//! - `dispatch`：任务图派发器（依赖计数、有界并发、超时、取消、级联跳过）
//! - `tools`：Tool trait、注册表、参数 Schema 与内置模拟工具
//! - `session`：会话与消息、内存/文件存储、上下文窗口与落盘点
//! - `config`：TOML + `WASP__*` 环境变量
//! - `observability`：tracing 初始化

pub mod approval;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod observability;
pub mod plan;
pub mod provider;
pub mod risk;
pub mod session;
pub mod tools;
