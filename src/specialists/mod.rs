//! 专家策略
//!
//! 每个专家对 decide(上下文) 返回恰好一个 Action：直接回复、请求工具调用、
//! 或请求切换到另一位专家。注册表是有限的（Host / Planner / QuizCoach），
//! 按标识符选择，无反射、无动态属性查找。

pub mod host;
pub mod planner;
pub mod quiz_coach;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::TutorError;
use crate::quiz::QuizState;
use crate::session::message::{Message, Role, ToolCallRecord};

pub use host::Host;
pub use planner::Planner;
pub use quiz_coach::QuizCoach;

/// 专家标识符（有限集合）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistId {
    Host,
    Planner,
    QuizCoach,
}

impl SpecialistId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialistId::Host => "host",
            SpecialistId::Planner => "planner",
            SpecialistId::QuizCoach => "quiz_coach",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "host" => Some(SpecialistId::Host),
            "planner" => Some(SpecialistId::Planner),
            "quiz_coach" => Some(SpecialistId::QuizCoach),
            _ => None,
        }
    }
}

impl fmt::Display for SpecialistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 专家对一次调用的决策
#[derive(Clone, Debug)]
pub enum Action {
    /// 本轮的最终回复
    Reply(String),
    /// 请求一次工具调用，结果会以工具消息写回上下文后重新调用同一专家
    ToolCall { tool: String, args: Value },
    /// 请求把会话交给另一位专家
    Handoff { target: SpecialistId, reason: String },
}

/// 一轮处理内传给专家的上下文：完整历史（含本轮已缓冲的消息）+ 可变的测验状态
pub struct TurnContext<'a> {
    pub session_id: &'a str,
    pub history: &'a [Message],
    pub user_text: &'a str,
    pub quiz: &'a mut Option<QuizState>,
}

impl TurnContext<'_> {
    /// 本轮内最近一条工具调用记录（向前扫描到本轮用户消息为止）
    pub fn last_tool_record(&self) -> Option<&ToolCallRecord> {
        for message in self.history.iter().rev() {
            match message.role {
                Role::User => return None,
                Role::Tool => {
                    if let Some(ref record) = message.tool_call {
                        return Some(record);
                    }
                }
                Role::Specialist => continue,
            }
        }
        None
    }
}

/// 专家策略 trait
#[async_trait]
pub trait Specialist: Send + Sync {
    fn id(&self) -> SpecialistId;

    async fn decide(&self, ctx: &mut TurnContext<'_>) -> Result<Action, TutorError>;
}

/// 意图词与填充词，从请求文本提取话题时剔除
const TOPIC_STOPWORDS: &[&str] = &[
    "i", "me", "my", "a", "an", "the", "to", "of", "for", "on", "in", "at", "about",
    "please", "can", "could", "would", "you", "like", "want", "need", "help", "with",
    "some", "and", "so", "let's", "lets", "make", "create", "give", "start", "begin",
    "learn", "learning", "studying", "how", "do", "does", "is", "are", "new", "good",
    "study", "plan", "roadmap", "schedule", "curriculum", "quiz", "test", "practice",
    "question", "questions", "exam", "days", "day", "week", "basics", "online",
    "more", "another", "again", "now",
    "resource", "resources", "link", "links", "website", "websites", "free",
];

/// 从用户文本提取话题：剔除意图词与填充词，留下的词连成话题；全被剔除时回退到通用话题
pub fn extract_topic(text: &str) -> String {
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric() && c != '\'' && c != '_')
        .filter(|w| !w.is_empty())
        .collect();

    let lowered: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
    let kept: Vec<&str> = lowered
        .iter()
        .map(String::as_str)
        .filter(|w| !TOPIC_STOPWORDS.contains(w))
        .collect();

    if kept.is_empty() {
        "study skills".to_string()
    } else {
        kept.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_extraction_keeps_the_subject() {
        assert_eq!(extract_topic("I need a study plan for fractions"), "fractions");
        assert_eq!(extract_topic("quiz me on algebra"), "algebra");
        assert_eq!(extract_topic("Can you quiz me on english vocab please"), "english vocab");
    }

    #[test]
    fn topic_extraction_falls_back_when_everything_is_filler() {
        assert_eq!(extract_topic("please help me study"), "study skills");
    }

    #[test]
    fn specialist_id_round_trips_through_strings() {
        for id in [SpecialistId::Host, SpecialistId::Planner, SpecialistId::QuizCoach] {
            assert_eq!(SpecialistId::parse(id.as_str()), Some(id));
        }
        assert_eq!(SpecialistId::parse("wizard"), None);
    }
}
