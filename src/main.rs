//! StudyPath - 学习辅导智能体
//!
//! 入口：初始化日志与配置，组装工具、专家与编排器，运行命令行 REPL。

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use studypath::config::load_config;
use studypath::core::{Orchestrator, OrchestratorConfig};
use studypath::llm::{LlmClient, OpenAiClient};
use studypath::observability;
use studypath::quiz::BuiltinQuestionBank;
use studypath::session::create_session_store;
use studypath::specialists::{Host, Planner, QuizCoach, SpecialistId};
use studypath::tools::{LocalTipTool, ToolDispatcher, ToolRegistry, WebSearchTool};

const BANNER: &str = "StudyPath tutor - type your question, or /quiz <topic>, /list, /history, /search <keyword>, /exit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config = load_config(None).context("Failed to load configuration")?;

    // 小对话走 LLM，没有 key 时 Host 自动退化为澄清式回复
    let llm: Option<Arc<dyn LlmClient>> = match config.llm.provider.as_str() {
        "openai" if std::env::var("OPENAI_API_KEY").is_ok() => Some(Arc::new(OpenAiClient::new(
            config.llm.base_url.as_deref(),
            &config.llm.model,
            None,
        ))),
        "openai" => {
            tracing::warn!("OPENAI_API_KEY not set; host replies fall back to canned text");
            None
        }
        other => {
            tracing::warn!(provider = other, "Unknown LLM provider; running without one");
            None
        }
    };

    let mut registry = ToolRegistry::new();
    let tips = match &config.tools.tips_file {
        Some(path) => LocalTipTool::with_data_file(path),
        None => LocalTipTool::new(),
    };
    registry.register(tips);
    registry.register(WebSearchTool::new(
        config.tools.search.endpoint.clone(),
        config.tools.search.timeout_secs,
        config.tools.search.max_results,
    ));

    let dispatcher = ToolDispatcher::new(
        Arc::new(registry),
        config.orchestrator.tool_timeout_secs,
        config.orchestrator.tool_retry_backoff_ms,
    );
    let store = create_session_store(config.app.db_path.as_deref());
    let bank = Arc::new(BuiltinQuestionBank::new());

    let mut orchestrator = Orchestrator::new(
        store,
        dispatcher,
        bank.clone(),
        OrchestratorConfig {
            max_steps: config.orchestrator.max_steps,
            questions_per_quiz: config.quiz.questions_per_quiz,
        },
    );
    orchestrator.register(Arc::new(Host::new(llm)));
    orchestrator.register(Arc::new(Planner::new()));
    orchestrator.register(Arc::new(QuizCoach::new(bank, config.quiz.questions_per_quiz)));

    run_repl(orchestrator).await
}

async fn run_repl(orchestrator: Orchestrator) -> anyhow::Result<()> {
    println!("{BANNER}");
    let mut session_id = uuid::Uuid::new_v4().to_string();
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        print!("You: ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.split_once(' ').unwrap_or((input, "")) {
            ("/exit" | "/quit" | "exit" | "quit", _) => break,
            ("/new", _) => {
                session_id = uuid::Uuid::new_v4().to_string();
                println!("Started a fresh session.");
            }
            ("/list", _) => {
                for meta in orchestrator.list_sessions().await? {
                    println!("{}  {}  {}", meta.created_at.to_rfc3339(), meta.id, meta.title);
                }
            }
            ("/history", _) => {
                for message in orchestrator.session_history(&session_id).await? {
                    println!("[{:?}] {}", message.role, message.content);
                }
            }
            ("/search", keyword) if !keyword.is_empty() => {
                for message in orchestrator.search_history(&session_id, keyword).await? {
                    println!("[{:?}] {}", message.role, message.content);
                }
            }
            ("/quiz", topic) if !topic.is_empty() => match orchestrator
                .start_quiz(&session_id, topic.trim())
                .await
            {
                Ok(summary) => {
                    let history = orchestrator.session_history(&session_id).await?;
                    if let Some(message) = history.last() {
                        println!(
                            "StudyPath ({}): {}",
                            SpecialistId::QuizCoach,
                            message.content
                        );
                    }
                    tracing::debug!(?summary, "Quiz started from REPL");
                }
                Err(error) => println!("Could not start that quiz: {error}"),
            },
            _ => match orchestrator.handle_turn(&session_id, input).await {
                Ok(outcome) => {
                    println!("StudyPath ({}): {}", outcome.active_specialist, outcome.reply)
                }
                Err(error) => {
                    tracing::error!(%error, "Turn failed");
                    println!("StudyPath: something went wrong storing that turn, please retry.");
                }
            },
        }
    }

    println!("Bye - keep studying!");
    Ok(())
}
