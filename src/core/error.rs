//! 辅导系统错误类型
//!
//! 三类处理方式：配置错误（UnknownSpecialist/UnknownTool）记日志并回退为道歉回复；
//! 瞬时外部错误（ToolDispatchFailure/LlmError）退避重试一次后降级；
//! 用户级信号（QuizAlreadyComplete 等）转为对话内友好消息，不作为系统失败传播。

use thiserror::Error;

/// 编排与辅导过程中可能出现的错误
#[derive(Error, Debug)]
pub enum TutorError {
    /// 切换目标未注册，属于接线/配置 bug，不面向用户
    #[error("Unknown specialist: {0}")]
    UnknownSpecialist(String),

    /// 策略请求了未注册的工具名
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for tool {tool}: {reason}")]
    InvalidToolArgs { tool: String, reason: String },

    #[error("Tool dispatch failed: {tool}: {reason}")]
    ToolDispatchFailure { tool: String, reason: String },

    /// 防御性步数上限，降级为回退回复，绝不让会话崩溃
    #[error("Orchestration loop exceeded {0} steps")]
    OrchestrationLoopExceeded(usize),

    #[error("Quiz already complete")]
    QuizAlreadyComplete,

    /// 创建测验时题目序列为空
    #[error("Quiz for topic '{0}' has no questions")]
    EmptyQuiz(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Session store error: {0}")]
    Store(String),
}
