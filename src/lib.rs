//! StudyPath - 多智能体学习辅导系统
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排器（handle_turn 主循环、切换/工具分发、会话锁）与错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: tracing 日志初始化
//! - **quiz**: 测验状态机与题库
//! - **session**: 消息模型与会话存储（内存 / SQLite）
//! - **specialists**: 专家策略（Host 路由、课程规划、测验教练）
//! - **tools**: 工具注册表与分发器（local_tip、web_search）

pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod quiz;
pub mod session;
pub mod specialists;
pub mod tools;

pub use crate::core::error::TutorError;
pub use crate::core::orchestrator::{Orchestrator, TurnOutcome};
