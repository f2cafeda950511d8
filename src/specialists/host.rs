//! Host：默认入口专家
//!
//! 只做分流：按固定关键词规则把消息路由到 Planner / QuizCoach，
//! 闲聊直接回复，其余交给可选的补全后端给一个简短回答；
//! 后端缺失或失败时降级为澄清提问，绝不让路由崩溃。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::error::TutorError;
use crate::llm::{LlmClient, LlmMessage};
use crate::session::message::Role;
use crate::specialists::{Action, Specialist, SpecialistId, TurnContext};

const QUIZ_KEYWORDS: &[&str] = &["quiz", "test", "practice", "question", "exam"];
const PLAN_KEYWORDS: &[&str] = &["plan", "roadmap", "schedule", "study", "curriculum", "syllabus"];
const GREETINGS: &[&str] = &["hello", "hi", "hey", "thanks", "thank", "bye", "goodbye"];

const GREETING_REPLY: &str = "Hello! I'm StudyPath, your study companion. \
    Ask me for a study plan (\"plan for fractions\") or a practice quiz (\"quiz me on algebra\").";

const CLARIFY_REPLY: &str = "I want to point you to the right helper. \
    Would you like a study plan for a topic, or a practice quiz? \
    For example: \"study plan for fractions\" or \"quiz me on algebra\".";

const HOST_PROMPT: &str = "You are StudyPath, an AI tutor for students in \
    under-resourced communities. Give a short, supportive, clear answer \
    (under 200 words). Assume limited internet, so avoid sending many links.";

pub struct Host {
    llm: Option<Arc<dyn LlmClient>>,
}

impl Host {
    pub fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { llm }
    }

    fn is_greeting(text: &str) -> bool {
        let lower = text.to_lowercase();
        lower
            .split_whitespace()
            .next()
            .map(|first| {
                let first = first.trim_matches(|c: char| !c.is_alphanumeric());
                GREETINGS.contains(&first)
            })
            .unwrap_or(false)
    }

    /// 小聊/简单问题：交给补全后端；失败时降级为澄清提问
    async fn direct_answer(&self, ctx: &TurnContext<'_>) -> String {
        let Some(ref llm) = self.llm else {
            return CLARIFY_REPLY.to_string();
        };

        let mut messages = vec![LlmMessage::system(HOST_PROMPT)];
        for m in ctx.history {
            match m.role {
                Role::User => messages.push(LlmMessage::user(m.content.clone())),
                Role::Specialist => messages.push(LlmMessage::assistant(m.content.clone())),
                // 工具观察对闲聊回答没有意义
                Role::Tool => continue,
            }
        }

        match llm.complete(&messages).await {
            Ok(answer) if !answer.trim().is_empty() => answer,
            Ok(_) => CLARIFY_REPLY.to_string(),
            Err(e) => {
                tracing::warn!("Host completion failed, degrading to clarification: {}", e);
                CLARIFY_REPLY.to_string()
            }
        }
    }
}

#[async_trait]
impl Specialist for Host {
    fn id(&self) -> SpecialistId {
        SpecialistId::Host
    }

    async fn decide(&self, ctx: &mut TurnContext<'_>) -> Result<Action, TutorError> {
        let lower = ctx.user_text.to_lowercase();

        if QUIZ_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return Ok(Action::Handoff {
                target: SpecialistId::QuizCoach,
                reason: "learner asked for practice".to_string(),
            });
        }

        if PLAN_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return Ok(Action::Handoff {
                target: SpecialistId::Planner,
                reason: "learner asked for a study plan".to_string(),
            });
        }

        if Self::is_greeting(ctx.user_text) {
            return Ok(Action::Reply(GREETING_REPLY.to_string()));
        }

        Ok(Action::Reply(self.direct_answer(ctx).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::FailingLlmClient;
    use crate::llm::MockLlmClient;
    use crate::session::message::Message;

    async fn decide_for(host: &Host, text: &str) -> Action {
        let history = vec![Message::user(text)];
        let mut quiz = None;
        let mut ctx = TurnContext {
            session_id: "s1",
            history: &history,
            user_text: text,
            quiz: &mut quiz,
        };
        host.decide(&mut ctx).await.unwrap()
    }

    #[tokio::test]
    async fn quiz_keywords_route_to_quiz_coach() {
        let host = Host::new(None);
        let action = decide_for(&host, "quiz me on algebra").await;
        assert!(matches!(
            action,
            Action::Handoff { target: SpecialistId::QuizCoach, .. }
        ));
    }

    #[tokio::test]
    async fn plan_keywords_route_to_planner() {
        let host = Host::new(None);
        let action = decide_for(&host, "I need a study plan for fractions").await;
        assert!(matches!(
            action,
            Action::Handoff { target: SpecialistId::Planner, .. }
        ));
    }

    #[tokio::test]
    async fn greeting_gets_a_direct_reply() {
        let host = Host::new(None);
        let action = decide_for(&host, "hello!").await;
        let Action::Reply(text) = action else {
            panic!("expected reply");
        };
        assert!(text.contains("StudyPath"));
    }

    #[tokio::test]
    async fn off_topic_uses_the_completion_backend() {
        let host = Host::new(Some(Arc::new(MockLlmClient::with_replies([
            "Gravity pulls objects toward each other.",
        ]))));
        let action = decide_for(&host, "what is gravity?").await;
        let Action::Reply(text) = action else {
            panic!("expected reply");
        };
        assert!(text.contains("Gravity"));
    }

    #[tokio::test]
    async fn completion_failure_degrades_to_clarification() {
        let host = Host::new(Some(Arc::new(FailingLlmClient)));
        let action = decide_for(&host, "what is gravity?").await;
        let Action::Reply(text) = action else {
            panic!("expected reply");
        };
        assert!(text.contains("study plan"));
    }
}
