//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 默认回显最后一条用户消息；可用 with_replies 预置脚本化回复，依次弹出。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::traits::{LlmClient, LlmMessage, LlmRole};

#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<String>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置按顺序返回的回复；耗尽后回到回显行为
    pub fn with_replies(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[LlmMessage]) -> Result<String, String> {
        if let Ok(mut replies) = self.replies.lock() {
            if let Some(reply) = replies.pop_front() {
                return Ok(reply);
            }
        }
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == LlmRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(format!("Here is a short answer about: {}", last_user))
    }
}

/// 始终失败的客户端，用于验证降级路径
#[derive(Debug, Default)]
pub struct FailingLlmClient;

#[async_trait]
impl LlmClient for FailingLlmClient {
    async fn complete(&self, _messages: &[LlmMessage]) -> Result<String, String> {
        Err("completion backend unavailable".to_string())
    }
}
