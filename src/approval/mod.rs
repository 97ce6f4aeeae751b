//! 审批门：风险动作的人工决策挂起点

pub mod gate;

pub use gate::{
    ApprovalGate, ApprovalNotice, ApprovalRequest, ApprovalState, Decision, Resolution,
};
