//! 工具派发器
//!
//! 以进程内任务图执行一个 ActionPlan：按序号索引的动作 arena、每动作剩余依赖计数、
//! 计数归零即派发。非 SAFE 动作先过审批门（等待期间不占并发额度），
//! 执行受 Semaphore 有界并发与单次调用超时约束；单动作失败只影响其依赖方。
//! 每次 run 持有自己的 plan_id：计划级超时与取消只过期本计划的审批，
//! 共享同一审批门的并发轮次互不干扰；取消令牌传播到在途调用，
//! 未到终态的动作记为 CANCELLED。每个动作恰好产出一条终态记录，
//! run 收尾时清掉本计划在审批门中的全部条目。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::approval::{ApprovalGate, Resolution};
use crate::dispatch::{ActionRecord, SkipReason};
use crate::plan::{ActionPlan, PlannedAction};
use crate::tools::{RiskClass, Tool, ToolRegistry};

/// 派发配置
#[derive(Clone, Debug)]
pub struct DispatchConfig {
    /// 最大并发工具调用数
    pub max_concurrent_tools: usize,
    /// 单次工具调用超时
    pub tool_timeout: Duration,
    /// 计划级超时：到点后强制过期所有 PENDING 审批
    pub plan_deadline: Duration,
    /// 互斥组：组名 → 工具名列表，同组工具串行执行（同资源写冲突由配置决定，默认全并行）
    pub serialize_groups: HashMap<String, Vec<String>>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tools: 3,
            tool_timeout: Duration::from_secs(30),
            plan_deadline: Duration::from_secs(120),
            serialize_groups: HashMap::new(),
        }
    }
}

/// 工具派发器：注册表 + 审批门 + 并发/超时约束
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    gate: Arc<ApprovalGate>,
    config: DispatchConfig,
    semaphore: Arc<Semaphore>,
    /// 工具名 → 所属互斥组的单许可信号量
    group_locks: HashMap<String, Arc<Semaphore>>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, gate: Arc<ApprovalGate>, config: DispatchConfig) -> Self {
        let mut group_locks = HashMap::new();
        for tools in config.serialize_groups.values() {
            let lock = Arc::new(Semaphore::new(1));
            for tool in tools {
                group_locks.insert(tool.clone(), lock.clone());
            }
        }
        Self {
            registry,
            gate,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_tools.max(1))),
            group_locks,
            config,
        }
    }

    /// 执行一个计划，返回与动作一一对应的终态记录（按序号排列）
    pub async fn run(
        &self,
        plan: &ActionPlan,
        risks: &[RiskClass],
        cancel: CancellationToken,
    ) -> Vec<ActionRecord> {
        let n = plan.actions.len();
        if n == 0 {
            return Vec::new();
        }
        let plan_id = uuid::Uuid::new_v4().to_string();

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut dep_remaining: Vec<usize> = vec![0; n];
        for action in &plan.actions {
            dep_remaining[action.index] = action.depends_on.len();
            for &dep in &action.depends_on {
                dependents[dep].push(action.index);
            }
        }

        let mut records: Vec<Option<ActionRecord>> = (0..n).map(|_| None).collect();
        let mut started = vec![false; n];
        let mut completed = 0usize;

        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, ActionRecord)>();

        for action in &plan.actions {
            if dep_remaining[action.index] == 0 {
                started[action.index] = true;
                self.spawn_action(&plan_id, action, risks[action.index], cancel.clone(), tx.clone());
            }
        }

        let deadline = tokio::time::sleep(self.config.plan_deadline);
        tokio::pin!(deadline);
        let mut deadline_hit = false;
        let mut cancel_hit = false;

        while completed < n {
            tokio::select! {
                _ = cancel.cancelled(), if !cancel_hit => {
                    cancel_hit = true;
                    // 在途任务各自观察令牌退出，这里只需释放本计划的审批等待方
                    self.gate.force_expire_plan(&plan_id);
                }
                () = &mut deadline, if !deadline_hit => {
                    deadline_hit = true;
                    tracing::warn!(plan_id = %plan_id, "plan deadline elapsed, expiring pending approvals");
                    self.gate.force_expire_plan(&plan_id);
                }
                recv = rx.recv() => {
                    let Some((index, record)) = recv else { break };
                    let unblocks = record.status.unblocks_dependents();
                    let was_cancelled = record.status == crate::dispatch::ActionStatus::Cancelled;
                    records[index] = Some(record);
                    completed += 1;

                    if unblocks {
                        for &d in &dependents[index] {
                            dep_remaining[d] -= 1;
                            if dep_remaining[d] == 0 && !started[d] {
                                started[d] = true;
                                self.spawn_action(
                                    &plan_id,
                                    &plan.actions[d],
                                    risks[d],
                                    cancel.clone(),
                                    tx.clone(),
                                );
                            }
                        }
                    } else {
                        // 依赖未成功：传递性跳过所有未启动的依赖方
                        let mut stack = dependents[index].clone();
                        while let Some(d) = stack.pop() {
                            if started[d] || records[d].is_some() {
                                continue;
                            }
                            started[d] = true;
                            let tool = &plan.actions[d].tool;
                            records[d] = Some(if was_cancelled {
                                ActionRecord::cancelled(d, tool)
                            } else {
                                ActionRecord::skipped(d, tool, SkipReason::DependencyFailed)
                            });
                            completed += 1;
                            stack.extend(dependents[d].iter().copied());
                        }
                    }
                }
            }
        }

        // 全部动作已到终态，本计划的审批条目不再被引用
        self.gate.finish_plan(&plan_id);

        records
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                r.unwrap_or_else(|| ActionRecord::cancelled(i, &plan.actions[i].tool))
            })
            .collect()
    }

    fn spawn_action(
        &self,
        plan_id: &str,
        action: &PlannedAction,
        risk: RiskClass,
        cancel: CancellationToken,
        tx: mpsc::UnboundedSender<(usize, ActionRecord)>,
    ) {
        let plan_id = plan_id.to_string();
        let action = action.clone();
        let tool = self.registry.get(&action.tool);
        let gate = self.gate.clone();
        let semaphore = self.semaphore.clone();
        let group = self.group_locks.get(&action.tool).cloned();
        let timeout = self.config.tool_timeout;

        tokio::spawn(async move {
            let index = action.index;
            let record =
                execute_one(plan_id, action, risk, tool, gate, semaphore, group, timeout, cancel)
                    .await;
            let _ = tx.send((index, record));
        });
    }
}

#[allow(clippy::too_many_arguments)]
async fn execute_one(
    plan_id: String,
    action: PlannedAction,
    risk: RiskClass,
    tool: Option<Arc<dyn Tool>>,
    gate: Arc<ApprovalGate>,
    semaphore: Arc<Semaphore>,
    group: Option<Arc<Semaphore>>,
    tool_timeout: Duration,
    cancel: CancellationToken,
) -> ActionRecord {
    let index = action.index;
    let name = action.tool.clone();

    if risk != RiskClass::Safe {
        let summary = format!("{name} {}", args_preview(&action.args));
        let (id, rx) = gate.submit(&plan_id, index, &name, &summary, risk);
        let resolution = tokio::select! {
            _ = cancel.cancelled() => return ActionRecord::cancelled(index, &name),
            r = gate.wait(&id, rx) => r,
        };
        match resolution {
            Resolution::Approved { .. } => {}
            Resolution::Rejected { resolver } => {
                return ActionRecord::rejected(index, &name, &resolver);
            }
            Resolution::Expired => {
                return ActionRecord::skipped(index, &name, SkipReason::ApprovalExpired);
            }
        }
    }

    let Some(tool) = tool else {
        return ActionRecord::failed(index, &name, format!("unknown tool: {name}"), Utc::now());
    };

    // 审批等待不占并发额度，进入执行前才取许可
    let _permit = tokio::select! {
        _ = cancel.cancelled() => return ActionRecord::cancelled(index, &name),
        p = semaphore.acquire_owned() => p.expect("semaphore closed"),
    };
    let _group_permit = match group {
        Some(g) => Some(tokio::select! {
            _ = cancel.cancelled() => return ActionRecord::cancelled(index, &name),
            p = g.acquire_owned() => p.expect("semaphore closed"),
        }),
        None => None,
    };

    let start = Instant::now();
    let started_at = Utc::now();
    let result = tokio::select! {
        _ = cancel.cancelled() => return ActionRecord::cancelled(index, &name),
        r = tokio::time::timeout(tool_timeout, tool.invoke(action.args.clone())) => r,
    };

    let (outcome, record) = match result {
        Ok(Ok(output)) => ("ok", ActionRecord::succeeded(index, &name, output, started_at)),
        Ok(Err(e)) => ("error", ActionRecord::failed(index, &name, e, started_at)),
        Err(_) => (
            "timeout",
            ActionRecord::failed(index, &name, format!("tool timeout: {name}"), started_at),
        ),
    };

    let audit = serde_json::json!({
        "event": "tool_audit",
        "tool": name,
        "index": index,
        "outcome": outcome,
        "duration_ms": start.elapsed().as_millis() as u64,
        "args_preview": args_preview(&action.args),
    });
    tracing::info!(audit = %audit.to_string(), "tool");

    record
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
