//! 编排器端到端测试：Mock 提供方脚本化计划，走完整生命周期

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use wasp::approval::Decision;
use wasp::config::AppConfig;
use wasp::core::{AgentError, Orchestrator};
use wasp::dispatch::{ActionStatus, SkipReason};
use wasp::provider::{MockProvider, ReasoningProvider};
use wasp::session::{MemorySessionStore, Message, SessionStore};
use wasp::tools::{EchoTool, RiskClass, Tool, ToolRegistry};

/// 计数工具：断言调用是否发生
struct CountingTool {
    name: &'static str,
    risk: RiskClass,
    fail: bool,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl CountingTool {
    fn safe(name: &'static str, calls: Arc<AtomicUsize>) -> Self {
        Self {
            name,
            risk: RiskClass::Safe,
            fail: false,
            delay: Duration::ZERO,
            calls,
        }
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "test tool"
    }
    fn risk_class(&self) -> RiskClass {
        self.risk
    }
    async fn invoke(&self, _args: Value) -> Result<Value, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            Err("simulated failure".to_string())
        } else {
            Ok(json!({"ok": true}))
        }
    }
}

fn plan_reply(steps: Value) -> String {
    json!({"reasoning": "scripted", "plan": steps}).to_string()
}

fn build(
    provider: Arc<dyn ReasoningProvider>,
    registry: ToolRegistry,
    config: AppConfig,
) -> (Orchestrator, tokio::sync::mpsc::UnboundedReceiver<wasp::approval::ApprovalNotice>) {
    let store = Arc::new(MemorySessionStore::new());
    Orchestrator::new(&config, provider, Arc::new(registry), store)
}

#[tokio::test]
async fn test_independent_safe_actions_both_run_without_approval() {
    let provider = Arc::new(
        MockProvider::new()
            .with_reply(plan_reply(json!([
                {"step": 1, "tool": "echo", "input": {"text": "cpu"}},
                {"step": 2, "tool": "echo", "input": {"text": "mem"}}
            ])))
            .with_reply("Both metrics fetched."),
    );
    let mut registry = ToolRegistry::new();
    registry.register(EchoTool);
    let (o, _rx) = build(provider, registry, AppConfig::default());

    let result = o.submit_turn("s", "fetch cpu and mem").await.unwrap();

    assert_eq!(result.action_records.len(), 2);
    assert!(result
        .action_records
        .iter()
        .all(|r| r.status == ActionStatus::Succeeded));
    assert_eq!(result.response_text, "Both metrics fetched.");
}

#[tokio::test]
async fn test_destructive_action_waits_for_approval_then_runs() {
    let calls = Arc::new(AtomicUsize::new(0));
    let provider = Arc::new(
        MockProvider::new()
            .with_reply(plan_reply(json!([
                {"step": 1, "tool": "stop_instance", "input": {}}
            ])))
            .with_reply("Instance stopped."),
    );
    let mut registry = ToolRegistry::new();
    registry.register(CountingTool {
        name: "stop_instance",
        risk: RiskClass::Destructive,
        fail: false,
        delay: Duration::ZERO,
        calls: calls.clone(),
    });
    let (o, mut notice_rx) = build(provider, registry, AppConfig::default());
    let o = Arc::new(o);

    let runner = {
        let o = o.clone();
        tokio::spawn(async move { o.submit_turn("s", "stop i-1").await })
    };

    // 动作在决议前不得执行
    let notice = notice_rx.recv().await.unwrap();
    assert_eq!(notice.risk, RiskClass::Destructive);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    o.resolve_approval(&notice.id, Decision::Approve, "alice")
        .unwrap();

    let result = runner.await.unwrap().unwrap();
    assert_eq!(result.action_records[0].status, ActionStatus::Succeeded);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unapproved_destructive_expires_and_turn_completes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let provider = Arc::new(MockProvider::new().with_reply(plan_reply(json!([
        {"step": 1, "tool": "stop_instance", "input": {}}
    ]))));
    let mut registry = ToolRegistry::new();
    registry.register(CountingTool {
        name: "stop_instance",
        risk: RiskClass::Destructive,
        fail: false,
        delay: Duration::ZERO,
        calls: calls.clone(),
    });
    let mut config = AppConfig::default();
    config.approval.timeout_secs = 0; // 立即过期
    let (o, _rx) = build(provider, registry, config);

    let result = o.submit_turn("s", "stop i-1").await.unwrap();

    assert_eq!(result.action_records[0].status, ActionStatus::Skipped);
    assert_eq!(
        result.action_records[0].skip_reason,
        Some(SkipReason::ApprovalExpired)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    // 回复要点名跳过的动作
    assert!(result.response_text.contains("stop_instance"));
}

#[tokio::test]
async fn test_rejected_approval_recorded_as_rejected() {
    let provider = Arc::new(MockProvider::new().with_reply(plan_reply(json!([
        {"step": 1, "tool": "stop_instance", "input": {}}
    ]))));
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = ToolRegistry::new();
    registry.register(CountingTool {
        name: "stop_instance",
        risk: RiskClass::Destructive,
        fail: false,
        delay: Duration::ZERO,
        calls: calls.clone(),
    });
    let (o, mut notice_rx) = build(provider, registry, AppConfig::default());
    let o = Arc::new(o);

    let runner = {
        let o = o.clone();
        tokio::spawn(async move { o.submit_turn("s", "stop i-1").await })
    };
    let notice = notice_rx.recv().await.unwrap();
    o.resolve_approval(&notice.id, Decision::Reject, "bob")
        .unwrap();

    // 第二次决议恰好一次失败
    let err = o
        .resolve_approval(&notice.id, Decision::Approve, "eve")
        .unwrap_err();
    assert!(matches!(err, AgentError::AlreadyResolved(_)));

    let result = runner.await.unwrap().unwrap();
    assert_eq!(result.action_records[0].status, ActionStatus::Rejected);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_dependency_skips_dependent_without_invoking() {
    let fail_calls = Arc::new(AtomicUsize::new(0));
    let dep_calls = Arc::new(AtomicUsize::new(0));
    let provider = Arc::new(MockProvider::new().with_reply(plan_reply(json!([
        {"step": 1, "tool": "flaky", "input": {}},
        {"step": 2, "tool": "after", "input": {}, "depends_on": [0]}
    ]))));
    let mut registry = ToolRegistry::new();
    registry.register(CountingTool {
        name: "flaky",
        risk: RiskClass::Safe,
        fail: true,
        delay: Duration::ZERO,
        calls: fail_calls.clone(),
    });
    registry.register(CountingTool::safe("after", dep_calls.clone()));
    let (o, _rx) = build(provider, registry, AppConfig::default());

    let result = o.submit_turn("s", "do both").await.unwrap();

    assert_eq!(result.action_records[0].status, ActionStatus::Failed);
    assert_eq!(result.action_records[1].status, ActionStatus::Skipped);
    assert_eq!(
        result.action_records[1].skip_reason,
        Some(SkipReason::DependencyFailed)
    );
    assert_eq!(fail_calls.load(Ordering::SeqCst), 1);
    assert_eq!(dep_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_tool_plan_is_invalidated_entirely() {
    let echo_calls = Arc::new(AtomicUsize::new(0));
    let provider = Arc::new(MockProvider::new().with_reply(plan_reply(json!([
        {"step": 1, "tool": "known", "input": {}},
        {"step": 2, "tool": "made_up_tool", "input": {}}
    ]))));
    let mut registry = ToolRegistry::new();
    registry.register(CountingTool::safe("known", echo_calls.clone()));
    let (o, _rx) = build(provider, registry, AppConfig::default());

    let result = o.submit_turn("s", "try it").await.unwrap();

    // 整个计划作废：合法的那一步也不执行
    assert!(result.action_records.is_empty());
    assert_eq!(echo_calls.load(Ordering::SeqCst), 0);
    assert!(result.response_text.contains("made_up_tool"));
}

#[tokio::test]
async fn test_malformed_plan_json_yields_explanatory_reply() {
    let provider = Arc::new(
        MockProvider::new().with_reply(r#"{"reasoning": "oops", "plan": [{"tool": 42}]}"#),
    );
    let mut registry = ToolRegistry::new();
    registry.register(EchoTool);
    let (o, _rx) = build(provider, registry, AppConfig::default());

    let result = o.submit_turn("s", "broken").await.unwrap();
    assert!(result.action_records.is_empty());
    assert!(!result.response_text.is_empty());
}

#[tokio::test]
async fn test_forward_dependency_invalidates_plan() {
    let provider = Arc::new(MockProvider::new().with_reply(plan_reply(json!([
        {"step": 1, "tool": "echo", "input": {"text": "a"}, "depends_on": [1]},
        {"step": 2, "tool": "echo", "input": {"text": "b"}}
    ]))));
    let mut registry = ToolRegistry::new();
    registry.register(EchoTool);
    let (o, _rx) = build(provider, registry, AppConfig::default());

    let result = o.submit_turn("s", "cyclic").await.unwrap();
    assert!(result.action_records.is_empty());
}

#[tokio::test]
async fn test_concurrent_turn_on_same_session_rejected() {
    let slow_calls = Arc::new(AtomicUsize::new(0));
    let provider = Arc::new(
        MockProvider::new()
            .with_reply(plan_reply(json!([
                {"step": 1, "tool": "slow", "input": {}}
            ])))
            .with_reply("done"),
    );
    let mut registry = ToolRegistry::new();
    registry.register(CountingTool {
        name: "slow",
        risk: RiskClass::Safe,
        fail: false,
        delay: Duration::from_millis(300),
        calls: slow_calls,
    });
    let (o, _rx) = build(provider, registry, AppConfig::default());
    let o = Arc::new(o);

    let first = {
        let o = o.clone();
        tokio::spawn(async move { o.submit_turn("s", "long job").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = o.submit_turn("s", "another").await.unwrap_err();
    assert!(matches!(err, AgentError::SessionBusy(_)));

    // 第一轮不受影响
    let result = first.await.unwrap().unwrap();
    assert_eq!(result.action_records[0].status, ActionStatus::Succeeded);
}

/// 整批落盘失败 N 次的存储（模拟瞬时写故障）
struct FlakyStore {
    inner: MemorySessionStore,
    fail_remaining: std::sync::Mutex<usize>,
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn get_session(&self, id: &str) -> Result<Option<wasp::session::Session>, String> {
        self.inner.get_session(id).await
    }
    async fn create_session(&self, id: &str) -> Result<wasp::session::Session, String> {
        self.inner.create_session(id).await
    }
    async fn append_message(&self, id: &str, message: Message) -> Result<(), String> {
        self.inner.append_message(id, message).await
    }
    async fn append_messages(&self, id: &str, messages: Vec<Message>) -> Result<(), String> {
        {
            let mut n = self.fail_remaining.lock().unwrap();
            if *n > 0 {
                *n -= 1;
                return Err("simulated write failure".to_string());
            }
        }
        self.inner.append_messages(id, messages).await
    }
}

#[tokio::test]
async fn test_transient_persist_failure_does_not_duplicate_messages() {
    let provider = Arc::new(
        MockProvider::new()
            .with_reply(plan_reply(json!([
                {"step": 1, "tool": "echo", "input": {"text": "hi"}}
            ])))
            .with_reply("done"),
    );
    let mut registry = ToolRegistry::new();
    registry.register(EchoTool);
    let store = Arc::new(FlakyStore {
        inner: MemorySessionStore::new(),
        fail_remaining: std::sync::Mutex::new(1),
    });
    let (o, _rx) = Orchestrator::new(
        &AppConfig::default(),
        provider,
        Arc::new(registry),
        store.clone(),
    );

    o.submit_turn("s", "say hi").await.unwrap();

    // 落盘重试后 user 消息恰好一份，轮次不半截
    let session = store.get_session("s").await.unwrap().unwrap();
    assert_eq!(session.messages.len(), 2);
    let user_copies = session
        .messages
        .iter()
        .filter(|m| m.content == "say hi")
        .count();
    assert_eq!(user_copies, 1);
}

#[tokio::test]
async fn test_turn_persists_user_and_assistant_together() {
    let provider = Arc::new(
        MockProvider::new()
            .with_reply(plan_reply(json!([
                {"step": 1, "tool": "echo", "input": {"text": "hi"}}
            ])))
            .with_reply("done"),
    );
    let mut registry = ToolRegistry::new();
    registry.register(EchoTool);
    let store = Arc::new(MemorySessionStore::new());
    let (o, _rx) = Orchestrator::new(
        &AppConfig::default(),
        provider,
        Arc::new(registry),
        store.clone(),
    );

    o.submit_turn("s", "say hi").await.unwrap();

    let session = store.get_session("s").await.unwrap().unwrap();
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[0].content, "say hi");
    let payload = session.messages[1].payload.as_ref().unwrap();
    assert_eq!(payload.reasoning, "scripted");
    assert_eq!(payload.records.len(), 1);
}

#[tokio::test]
async fn test_auto_approve_sensitive_skips_gate_but_not_destructive() {
    let sens_calls = Arc::new(AtomicUsize::new(0));
    let dest_calls = Arc::new(AtomicUsize::new(0));
    let provider = Arc::new(
        MockProvider::new()
            .with_reply(plan_reply(json!([
                {"step": 1, "tool": "sensitive_op", "input": {}},
                {"step": 2, "tool": "destructive_op", "input": {}}
            ])))
            .with_reply("done"),
    );
    let mut registry = ToolRegistry::new();
    registry.register(CountingTool {
        name: "sensitive_op",
        risk: RiskClass::Sensitive,
        fail: false,
        delay: Duration::ZERO,
        calls: sens_calls.clone(),
    });
    registry.register(CountingTool {
        name: "destructive_op",
        risk: RiskClass::Destructive,
        fail: false,
        delay: Duration::ZERO,
        calls: dest_calls.clone(),
    });
    let mut config = AppConfig::default();
    config.approval.auto_approve_sensitive = true;
    config.approval.timeout_secs = 0; // DESTRUCTIVE 无人决议即过期
    let (o, _rx) = build(provider, registry, config);

    let result = o.submit_turn("s", "both").await.unwrap();

    assert_eq!(result.action_records[0].status, ActionStatus::Succeeded);
    assert_eq!(sens_calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.action_records[1].status, ActionStatus::Skipped);
    assert_eq!(dest_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_synthesis_falls_back_to_summary() {
    // 综合返回空文本时退回动作摘要
    let provider = Arc::new(
        MockProvider::new()
            .with_reply(plan_reply(json!([
                {"step": 1, "tool": "echo", "input": {"text": "hi"}}
            ])))
            .with_reply(""),
    );
    let mut registry = ToolRegistry::new();
    registry.register(EchoTool);
    let (o, _rx) = build(provider, registry, AppConfig::default());

    let result = o.submit_turn("s", "say hi").await.unwrap();
    assert_eq!(result.action_records[0].status, ActionStatus::Succeeded);
    assert!(result.response_text.contains("echo"));
    assert!(result.response_text.contains("Succeeded"));
}
