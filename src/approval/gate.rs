//! 审批门状态机
//!
//! 每个非 SAFE 动作生成一个 ApprovalRequest：PENDING → {APPROVED, REJECTED, EXPIRED}，
//! 状态单调，不可回退。等待方通过 oneshot 接收决议，恰好一次；
//! 第二次 resolve 返回 AlreadyResolved 且无状态变更。
//! 请求按 plan_id 分组：计划级超时 / 取消只过期本计划的请求，并发轮次互不干扰；
//! 已过期计划的后续 submit 直接落为 EXPIRED。计划收尾时 finish_plan 清掉其全部条目。
//! 创建时向外发 ApprovalNotice（出站审批通道），resolve 为入站通道。

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::core::AgentError;
use crate::tools::RiskClass;

/// 审批请求状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
    Expired,
}

/// 入站决议
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// 发给等待方的决议结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Approved { resolver: String },
    Rejected { resolver: String },
    Expired,
}

/// 出站通知：审批请求已创建，等待外部决策
#[derive(Clone, Debug)]
pub struct ApprovalNotice {
    pub id: String,
    pub action_index: usize,
    pub tool: String,
    pub summary: String,
    pub risk: RiskClass,
}

/// 审批请求快照（供观测）
#[derive(Clone, Debug)]
pub struct ApprovalRequest {
    pub id: String,
    pub action_index: usize,
    pub tool: String,
    pub risk: RiskClass,
    pub state: ApprovalState,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolver: Option<String>,
}

struct Entry {
    plan_id: String,
    request: ApprovalRequest,
    tx: Option<oneshot::Sender<Resolution>>,
}

#[derive(Default)]
struct GateState {
    entries: HashMap<String, Entry>,
    /// 已整体过期的计划：其后续 submit 直接落为 EXPIRED
    expired_plans: HashSet<String>,
}

/// 审批门：挂起风险动作直到人工决议或超时
pub struct ApprovalGate {
    timeout: Duration,
    /// 放宽配置：SENSITIVE 自动批准；对 DESTRUCTIVE 无效
    auto_approve_sensitive: bool,
    state: Mutex<GateState>,
    notice_tx: mpsc::UnboundedSender<ApprovalNotice>,
}

impl ApprovalGate {
    /// 创建审批门与出站通知接收端
    pub fn new(
        timeout: Duration,
        auto_approve_sensitive: bool,
    ) -> (Self, mpsc::UnboundedReceiver<ApprovalNotice>) {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        (
            Self {
                timeout,
                auto_approve_sensitive,
                state: Mutex::new(GateState::default()),
                notice_tx,
            },
            notice_rx,
        )
    }

    /// 为一个风险动作创建审批请求，返回请求 id 与决议接收端。
    /// 计划已整体过期时立即落为 EXPIRED；auto_approve_sensitive 时 SENSITIVE
    /// 立即批准（resolver "auto"）；DESTRUCTIVE 永不自动批准。
    pub fn submit(
        &self,
        plan_id: &str,
        action_index: usize,
        tool: &str,
        summary: &str,
        risk: RiskClass,
    ) -> (String, oneshot::Receiver<Resolution>) {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();

        let mut request = ApprovalRequest {
            id: id.clone(),
            action_index,
            tool: tool.to_string(),
            risk,
            state: ApprovalState::Pending,
            created_at: Utc::now(),
            resolved_at: None,
            resolver: None,
        };

        let mut state = self.state.lock().expect("approval gate lock poisoned");

        // 计划级超时 / 取消之后解锁的动作：不再进入等待
        if state.expired_plans.contains(plan_id) {
            request.state = ApprovalState::Expired;
            request.resolved_at = Some(Utc::now());
            let _ = tx.send(Resolution::Expired);
            state.entries.insert(
                id.clone(),
                Entry {
                    plan_id: plan_id.to_string(),
                    request,
                    tx: None,
                },
            );
            return (id, rx);
        }

        if self.auto_approve_sensitive && risk == RiskClass::Sensitive {
            request.state = ApprovalState::Approved;
            request.resolved_at = Some(Utc::now());
            request.resolver = Some("auto".to_string());
            let _ = tx.send(Resolution::Approved {
                resolver: "auto".to_string(),
            });
            state.entries.insert(
                id.clone(),
                Entry {
                    plan_id: plan_id.to_string(),
                    request,
                    tx: None,
                },
            );
            return (id, rx);
        }

        state.entries.insert(
            id.clone(),
            Entry {
                plan_id: plan_id.to_string(),
                request,
                tx: Some(tx),
            },
        );
        drop(state);

        // 接收端可能已关闭（无人消费通知），不视为错误
        let _ = self.notice_tx.send(ApprovalNotice {
            id: id.clone(),
            action_index,
            tool: tool.to_string(),
            summary: summary.to_string(),
            risk,
        });
        tracing::info!(approval_id = %id, plan_id, tool, risk = risk.as_str(), "approval requested");

        (id, rx)
    }

    /// 等待决议；超时则将请求置为 EXPIRED 并返回 Expired
    pub async fn wait(&self, id: &str, rx: oneshot::Receiver<Resolution>) -> Resolution {
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(resolution)) => resolution,
            // 发送端被丢弃或超时：二者都按过期处理，但先检查是否恰好已决议
            Ok(Err(_)) | Err(_) => self.expire(id),
        }
    }

    /// 入站决议：恰好一次。未知 id → UnknownApproval；已决议 → AlreadyResolved，无状态变更
    pub fn resolve(
        &self,
        id: &str,
        decision: Decision,
        resolver: &str,
    ) -> Result<ApprovalState, AgentError> {
        let mut state = self.state.lock().expect("approval gate lock poisoned");
        let entry = state
            .entries
            .get_mut(id)
            .ok_or_else(|| AgentError::UnknownApproval(id.to_string()))?;

        if entry.request.state != ApprovalState::Pending {
            return Err(AgentError::AlreadyResolved(id.to_string()));
        }

        let (new_state, resolution) = match decision {
            Decision::Approve => (
                ApprovalState::Approved,
                Resolution::Approved {
                    resolver: resolver.to_string(),
                },
            ),
            Decision::Reject => (
                ApprovalState::Rejected,
                Resolution::Rejected {
                    resolver: resolver.to_string(),
                },
            ),
        };

        entry.request.state = new_state;
        entry.request.resolved_at = Some(Utc::now());
        entry.request.resolver = Some(resolver.to_string());
        if let Some(tx) = entry.tx.take() {
            let _ = tx.send(resolution);
        }
        tracing::info!(approval_id = %id, state = ?new_state, resolver, "approval resolved");

        Ok(new_state)
    }

    /// 将一个计划的全部 PENDING 请求强制置为 EXPIRED，并标记该计划：
    /// 其后续 submit 直接落为 EXPIRED。其他计划的请求不受影响
    pub fn force_expire_plan(&self, plan_id: &str) {
        let mut state = self.state.lock().expect("approval gate lock poisoned");
        state.expired_plans.insert(plan_id.to_string());
        for entry in state.entries.values_mut() {
            if entry.plan_id == plan_id && entry.request.state == ApprovalState::Pending {
                entry.request.state = ApprovalState::Expired;
                entry.request.resolved_at = Some(Utc::now());
                if let Some(tx) = entry.tx.take() {
                    let _ = tx.send(Resolution::Expired);
                }
            }
        }
    }

    /// 计划收尾：删除其全部条目与过期标记，条目数量随在途计划数有界
    pub fn finish_plan(&self, plan_id: &str) {
        let mut state = self.state.lock().expect("approval gate lock poisoned");
        state.entries.retain(|_, e| e.plan_id != plan_id);
        state.expired_plans.remove(plan_id);
    }

    /// 全部在途请求快照（供观测 / 测试）
    pub fn snapshot(&self) -> Vec<ApprovalRequest> {
        self.state
            .lock()
            .expect("approval gate lock poisoned")
            .entries
            .values()
            .map(|e| e.request.clone())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .expect("approval gate lock poisoned")
            .entries
            .values()
            .filter(|e| e.request.state == ApprovalState::Pending)
            .count()
    }

    /// 将请求置为过期；若与入站决议竞争时对方先到，按已落定的状态返回
    fn expire(&self, id: &str) -> Resolution {
        let mut state = self.state.lock().expect("approval gate lock poisoned");
        let Some(entry) = state.entries.get_mut(id) else {
            return Resolution::Expired;
        };
        match entry.request.state {
            ApprovalState::Pending => {
                entry.request.state = ApprovalState::Expired;
                entry.request.resolved_at = Some(Utc::now());
                entry.tx.take();
                Resolution::Expired
            }
            ApprovalState::Approved => Resolution::Approved {
                resolver: entry.request.resolver.clone().unwrap_or_default(),
            },
            ApprovalState::Rejected => Resolution::Rejected {
                resolver: entry.request.resolver.clone().unwrap_or_default(),
            },
            ApprovalState::Expired => Resolution::Expired,
        }
    }
}
