//! LLM 客户端抽象
//!
//! 补全能力在编排层被视为不透明函数：prompt + 上下文 → 文本。
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient::complete。

use async_trait::async_trait;

/// 发给补全端点的消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LlmRole {
    System,
    User,
    Assistant,
}

/// 发给补全端点的单条消息
#[derive(Clone, Debug)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::Assistant,
            content: content.into(),
        }
    }
}

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[LlmMessage]) -> Result<String, String>;
}
