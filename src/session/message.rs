//! 消息模型
//!
//! 会话历史是只追加的 Message 序列；工具调用记录与切换备注作为消息附注保存，
//! 一旦追加不再修改。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::specialists::SpecialistId;

/// 消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Specialist,
    Tool,
}

/// 一次工具调用的完整记录：结果与失败原因二者必居其一，绝无悬挂的 pending 状态
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub args: serde_json::Value,
    pub result: Option<String>,
    pub failure: Option<String>,
    pub duration_ms: u64,
}

impl ToolCallRecord {
    pub fn success(
        tool: impl Into<String>,
        args: serde_json::Value,
        result: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            tool: tool.into(),
            args,
            result: Some(result.into()),
            failure: None,
            duration_ms,
        }
    }

    pub fn failure(
        tool: impl Into<String>,
        args: serde_json::Value,
        reason: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            tool: tool.into(),
            args,
            result: None,
            failure: Some(reason.into()),
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }
}

/// 切换备注：记录在 specialist 消息上，便于追溯路由决策
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandoffNote {
    pub from: SpecialistId,
    pub to: SpecialistId,
    pub reason: String,
}

/// 单条消息（追加后不可变）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff: Option<HandoffNote>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call: None,
            handoff: None,
            timestamp: Utc::now(),
        }
    }

    pub fn specialist(content: impl Into<String>) -> Self {
        Self {
            role: Role::Specialist,
            content: content.into(),
            tool_call: None,
            handoff: None,
            timestamp: Utc::now(),
        }
    }

    /// 工具消息：正文为观察摘要，附完整调用记录
    pub fn tool(content: impl Into<String>, record: ToolCallRecord) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call: Some(record),
            handoff: None,
            timestamp: Utc::now(),
        }
    }

    /// 切换消息：specialist 角色，附来源/目标/理由
    pub fn handoff(from: SpecialistId, to: SpecialistId, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            role: Role::Specialist,
            content: format!("Handing off from {} to {}: {}", from, to, reason),
            tool_call: None,
            handoff: Some(HandoffNote { from, to, reason }),
            timestamp: Utc::now(),
        }
    }
}
