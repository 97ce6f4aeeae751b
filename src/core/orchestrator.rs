//! 编排核心：一轮请求的完整生命周期
//!
//! submit_turn 按固定顺序推进：会话加载 → 历史装配 → 规划（带重试）→
//! 计划解释 → 风险分类 → 有界派发 → 回复综合（失败则兜底摘要）→ 落盘。
//! 落盘点在派发之后：user + assistant 一次性追加，崩溃不会留下半截轮次。
//! 同一会话同时只允许一轮在途，第二个请求立即拒绝（SessionBusy）。

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::approval::{ApprovalGate, ApprovalNotice, ApprovalRequest, ApprovalState, Decision};
use crate::config::AppConfig;
use crate::core::{AgentError, RetryPolicy};
use crate::dispatch::{ActionRecord, ToolDispatcher};
use crate::plan::{plan_format_schema_json, PlanInterpreter};
use crate::provider::{
    fallback_summary, planning_system_prompt, synthesis_prompt, MockProvider, OpenAiProvider,
    ReasoningProvider,
};
use crate::risk::RiskClassifier;
use crate::session::{Message, SessionContextManager, SessionStore, TurnPayload};
use crate::tools::ToolRegistry;

/// 一轮的最终产出
#[derive(Clone, Debug)]
pub struct TurnResult {
    /// 面向用户的最终回复
    pub response_text: String,
    /// 提供方的推理轨迹
    pub reasoning_trace: String,
    /// 与计划动作一一对应的终态记录
    pub action_records: Vec<ActionRecord>,
}

/// 编排器：持有全部组件，submit_turn 为唯一入口
pub struct Orchestrator {
    provider: Arc<dyn ReasoningProvider>,
    registry: Arc<ToolRegistry>,
    interpreter: PlanInterpreter,
    classifier: RiskClassifier,
    gate: Arc<ApprovalGate>,
    dispatcher: ToolDispatcher,
    context: SessionContextManager,
    retry: RetryPolicy,
    /// 在途轮次的会话 id 集合
    busy: Mutex<HashSet<String>>,
}

impl Orchestrator {
    /// 按配置装配编排器，返回出站审批通知接收端
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn ReasoningProvider>,
        registry: Arc<ToolRegistry>,
        store: Arc<dyn SessionStore>,
    ) -> (Self, mpsc::UnboundedReceiver<ApprovalNotice>) {
        let (gate, notice_rx) = ApprovalGate::new(
            config.approval.timeout(),
            config.approval.auto_approve_sensitive,
        );
        let gate = Arc::new(gate);

        let orchestrator = Self {
            provider,
            registry: registry.clone(),
            interpreter: PlanInterpreter::new(registry.clone()),
            classifier: RiskClassifier::new(config.risk_config()),
            gate: gate.clone(),
            dispatcher: ToolDispatcher::new(registry, gate, config.dispatch_config()),
            context: SessionContextManager::new(store, config.context_config()),
            retry: config.retry_policy(),
            busy: Mutex::new(HashSet::new()),
        };
        (orchestrator, notice_rx)
    }

    /// 处理一轮请求（无外部取消源）
    pub async fn submit_turn(
        &self,
        session_id: &str,
        user_text: &str,
    ) -> Result<TurnResult, AgentError> {
        self.submit_turn_with_cancel(session_id, user_text, CancellationToken::new())
            .await
    }

    /// 处理一轮请求；取消令牌触发后在途调用尽快退出，轮次仍正常收尾并落盘
    pub async fn submit_turn_with_cancel(
        &self,
        session_id: &str,
        user_text: &str,
        cancel: CancellationToken,
    ) -> Result<TurnResult, AgentError> {
        let _busy = BusyGuard::acquire(&self.busy, session_id)?;
        tracing::info!(session_id, "turn started");

        let session = self
            .retry
            .run("load_session", || self.context.load_session(session_id))
            .await?;

        // 规划输入：system（工具目录 + 线格式 Schema）+ 历史窗口 + 本轮用户消息
        let system = planning_system_prompt(&self.registry.catalog_json(), &plan_format_schema_json());
        let mut messages = vec![Message::system(system)];
        messages.extend(self.context.history_window(&session));
        messages.push(Message::user(user_text));

        let raw = self
            .retry
            .run("plan_completion", || {
                let msgs = messages.clone();
                async move {
                    self.provider
                        .complete(&msgs)
                        .await
                        .map_err(AgentError::ProviderError)
                }
            })
            .await?;

        // 计划作废不是轮次失败：转为解释性回复，零派发，照常落盘
        let interpreted = match self.interpreter.interpret(&raw) {
            Ok(plan) => plan,
            Err(
                e @ (AgentError::MalformedPlan(_)
                | AgentError::UnknownTool(_)
                | AgentError::SchemaMismatch { .. }),
            ) => {
                tracing::warn!(session_id, error = %e, "plan invalidated, no actions dispatched");
                let response = plan_failure_reply(&e);
                let assistant = Message::assistant(&response).with_payload(TurnPayload {
                    reasoning: String::new(),
                    records: Vec::new(),
                });
                self.persist(session_id, Message::user(user_text), assistant)
                    .await?;
                return Ok(TurnResult {
                    response_text: response,
                    reasoning_trace: String::new(),
                    action_records: Vec::new(),
                });
            }
            Err(e) => return Err(e),
        };

        // 风险分类：解释阶段已确认所有工具在注册表中
        let mut risks = Vec::with_capacity(interpreted.plan.len());
        for action in &interpreted.plan.actions {
            let spec = self
                .registry
                .spec(&action.tool)
                .ok_or_else(|| AgentError::UnknownTool(action.tool.clone()))?;
            risks.push(self.classifier.classify(action, &spec));
        }

        let records = self
            .dispatcher
            .run(&interpreted.plan, &risks, cancel.clone())
            .await;

        let response_text = self
            .synthesize(user_text, &interpreted.reasoning, &records, &raw, &cancel)
            .await;

        let assistant = Message::assistant(&response_text).with_payload(TurnPayload {
            reasoning: interpreted.reasoning.clone(),
            records: records.clone(),
        });
        self.persist(session_id, Message::user(user_text), assistant)
            .await?;

        tracing::info!(session_id, actions = records.len(), "turn completed");
        Ok(TurnResult {
            response_text,
            reasoning_trace: interpreted.reasoning,
            action_records: records,
        })
    }

    /// 入站审批决议（透传给审批门）
    pub fn resolve_approval(
        &self,
        approval_id: &str,
        decision: Decision,
        resolver: &str,
    ) -> Result<ApprovalState, AgentError> {
        self.gate.resolve(approval_id, decision, resolver)
    }

    /// 审批请求快照（供观测）
    pub fn approvals(&self) -> Vec<ApprovalRequest> {
        self.gate.snapshot()
    }

    /// 综合最终回复。纯分析轮直接用推理轨迹；取消或综合失败时退回动作摘要
    async fn synthesize(
        &self,
        user_text: &str,
        reasoning: &str,
        records: &[ActionRecord],
        raw_output: &str,
        cancel: &CancellationToken,
    ) -> String {
        if records.is_empty() {
            if !reasoning.is_empty() {
                return reasoning.to_string();
            }
            return raw_output.trim().to_string();
        }
        if cancel.is_cancelled() {
            return fallback_summary(records);
        }

        let prompt = synthesis_prompt(user_text, reasoning, records);
        let result = self
            .retry
            .run("synthesis_completion", || {
                let msgs = vec![Message::user(prompt.clone())];
                async move {
                    self.provider
                        .complete(&msgs)
                        .await
                        .map_err(AgentError::ProviderError)
                }
            })
            .await;

        match result {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => fallback_summary(records),
            Err(e) => {
                tracing::warn!(error = %e, "synthesis failed, using fallback summary");
                fallback_summary(records)
            }
        }
    }

    async fn persist(
        &self,
        session_id: &str,
        user: Message,
        assistant: Message,
    ) -> Result<(), AgentError> {
        self.retry
            .run("persist_turn", || {
                let user = user.clone();
                let assistant = assistant.clone();
                async move { self.context.persist_turn(session_id, user, assistant).await }
            })
            .await
    }
}

/// 计划作废时的解释性回复
fn plan_failure_reply(err: &AgentError) -> String {
    match err {
        AgentError::UnknownTool(tool) => format!(
            "I couldn't act on this request: the proposed plan referenced a tool \
I don't have (\"{tool}\"). No actions were taken. Please rephrase the request."
        ),
        AgentError::SchemaMismatch { tool, detail } => format!(
            "I couldn't act on this request: the proposed parameters for \"{tool}\" \
were invalid ({detail}). No actions were taken. Please rephrase the request."
        ),
        _ => "I couldn't turn this request into a valid action plan, so no actions \
were taken. Please rephrase the request."
            .to_string(),
    }
}

/// 同会话并发闸：插入失败即 SessionBusy，Drop 时移除
struct BusyGuard<'a> {
    busy: &'a Mutex<HashSet<String>>,
    session_id: String,
}

impl<'a> BusyGuard<'a> {
    fn acquire(busy: &'a Mutex<HashSet<String>>, session_id: &str) -> Result<Self, AgentError> {
        let mut set = busy.lock().expect("busy set lock poisoned");
        if !set.insert(session_id.to_string()) {
            return Err(AgentError::SessionBusy(session_id.to_string()));
        }
        Ok(Self {
            busy,
            session_id: session_id.to_string(),
        })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy
            .lock()
            .expect("busy set lock poisoned")
            .remove(&self.session_id);
    }
}

/// 按配置选择提供方：有 OPENAI_API_KEY 用 OpenAI 兼容端点，否则退回 Mock
pub fn create_provider(config: &AppConfig) -> Arc<dyn ReasoningProvider> {
    if std::env::var("OPENAI_API_KEY").is_ok() {
        Arc::new(OpenAiProvider::new(
            config.provider.base_url.as_deref(),
            &config.provider.model,
            None,
        ))
    } else {
        tracing::warn!("OPENAI_API_KEY not set, falling back to mock provider");
        Arc::new(MockProvider::new())
    }
}
