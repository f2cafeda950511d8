//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `STUDYPATH__*` 覆盖
//! （双下划线表示嵌套，如 `STUDYPATH__LLM__MODEL=gpt-4.1-mini`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
    #[serde(default)]
    pub quiz: QuizSection,
    #[serde(default)]
    pub tools: ToolsSection,
}

/// [app] 段：应用名、会话数据库路径
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 会话 SQLite 文件路径；未设置时使用内存存储
    pub db_path: Option<PathBuf>,
}

/// [llm] 段：后端选择与模型
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai（兼容端点）/ mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4.1-mini".to_string(),
            base_url: None,
        }
    }
}

/// [orchestrator] 段：主循环步数上限与工具分发参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    /// 单轮内最大 决策/工具/切换 步数，防止死循环
    pub max_steps: usize,
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// 瞬时失败重试前的退避（毫秒），仅重试一次
    pub tool_retry_backoff_ms: u64,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_steps: 5,
            tool_timeout_secs: 10,
            tool_retry_backoff_ms: 500,
        }
    }
}

/// [quiz] 段：每次测验的题目数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuizSection {
    pub questions_per_quiz: usize,
}

impl Default for QuizSection {
    fn default() -> Self {
        Self {
            questions_per_quiz: 5,
        }
    }
}

/// [tools] 段：本地提示数据文件与搜索端点
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ToolsSection {
    /// 话题提示 JSON 文件（data/topics.json），缺失时用内置表
    pub tips_file: Option<PathBuf>,
    #[serde(default)]
    pub search: SearchSection,
}

/// [tools.search] 段：OpenSearch 风格端点、超时、返回条数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_results: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: "https://en.wikipedia.org/w/api.php".to_string(),
            timeout_secs: 15,
            max_results: 3,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            orchestrator: OrchestratorSection::default(),
            quiz: QuizSection::default(),
            tools: ToolsSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 STUDYPATH__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 STUDYPATH__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("STUDYPATH")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
