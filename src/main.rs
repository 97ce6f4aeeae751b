//! Wasp - Rust DevOps 智能体编排核心
//!
//! 入口：初始化日志与配置，装配工具注册表、提供方与编排器，
//! 运行一个 stdin 命令循环。`approve <id>` / `reject <id>` 决议审批，
//! 其余输入作为一轮用户请求提交；审批通知异步打印。

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use wasp::approval::Decision;
use wasp::config::load_config;
use wasp::core::{create_provider, Orchestrator};
use wasp::session::{FileSessionStore, MemorySessionStore, SessionStore};
use wasp::tools::{
    CloudMutateTool, CloudResourcesTool, CostAnalysisTool, EchoTool, ToolRegistry, WebSearchTool,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wasp::observability::init();

    let config = load_config(None).context("Failed to load config")?;

    let mut registry = ToolRegistry::new();
    registry.register(CloudResourcesTool);
    registry.register(CloudMutateTool);
    registry.register(CostAnalysisTool);
    registry.register(WebSearchTool);
    registry.register(EchoTool);

    let store: Arc<dyn SessionStore> = match &config.app.session_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).context("Failed to create session dir")?;
            Arc::new(FileSessionStore::new(dir))
        }
        None => Arc::new(MemorySessionStore::new()),
    };

    let provider = create_provider(&config);
    let (orchestrator, mut notice_rx) =
        Orchestrator::new(&config, provider.clone(), Arc::new(registry), store);
    let orchestrator = Arc::new(orchestrator);

    // 审批通知：异步打印，提示操作者决议
    tokio::spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            println!(
                "\n[approval required] id={} tool={} risk={} — {}\n  type `approve {}` or `reject {}`",
                notice.id,
                notice.tool,
                notice.risk.as_str(),
                notice.summary,
                notice.id,
                notice.id,
            );
        }
    });

    println!("wasp ready. Type a request, `approve <id>` / `reject <id>`, or `quit`.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("stdin read failed")? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        if let Some(id) = input.strip_prefix("approve ") {
            match orchestrator.resolve_approval(id.trim(), Decision::Approve, "operator") {
                Ok(state) => println!("approval {} -> {:?}", id.trim(), state),
                Err(e) => println!("error: {e}"),
            }
            continue;
        }
        if let Some(id) = input.strip_prefix("reject ") {
            match orchestrator.resolve_approval(id.trim(), Decision::Reject, "operator") {
                Ok(state) => println!("approval {} -> {:?}", id.trim(), state),
                Err(e) => println!("error: {e}"),
            }
            continue;
        }

        // 轮次在后台跑，stdin 循环保持可用以便决议审批
        let orchestrator = orchestrator.clone();
        let text = input.to_string();
        tokio::spawn(async move {
            match orchestrator.submit_turn("local", &text).await {
                Ok(result) => {
                    println!("\n{}", result.response_text);
                    for record in &result.action_records {
                        println!("  [{}] {} -> {:?}", record.index, record.tool, record.status);
                    }
                }
                Err(e) => println!("error: {e}"),
            }
        });
    }

    let (prompt_tokens, completion_tokens, total_tokens) = provider.token_usage();
    tracing::info!(prompt_tokens, completion_tokens, total_tokens, "session token usage");

    Ok(())
}
