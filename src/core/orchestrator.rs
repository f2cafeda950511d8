//! 主控循环：在专家、工具与会话存储之间协调一次完整的对话轮
//!
//! 每轮的生命周期：
//! 1. 取到该会话的轮级锁（同一会话串行，不同会话并发）
//! 2. 加载会话与测验状态，把用户消息追加到本地副本
//! 3. 有界循环执行当前专家的决策：回复 / 工具调用 / 移交
//! 4. 循环结束后一次性落盘，保证存储里看不到半成品轮

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::error::TutorError;
use crate::quiz::{QuestionBank, QuizState, QuizSummary};
use crate::session::{Message, Session, SessionMeta, SessionStore};
use crate::specialists::{Action, Specialist, SpecialistId, TurnContext};
use crate::tools::ToolDispatcher;

/// 致命配置错误（未注册的专家/工具）时的兜底回复
const APOLOGY_REPLY: &str =
    "I'm sorry - something went wrong on my side while handling that. Please try asking again.";

/// 决策循环触顶时的兜底回复
const FALLBACK_REPLY: &str = "I got a little lost deciding how to help with that. \
     Could you rephrase? For example: \"make me a study plan for fractions\" \
     or \"quiz me on algebra\".";

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// 单轮内决策步数上限（工具调用与移交都计一步）
    pub max_steps: usize,
    pub questions_per_quiz: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_steps: 5,
            questions_per_quiz: 5,
        }
    }
}

/// 一轮对话的结果
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    pub reply: String,
    /// 本轮结束后接管会话的专家
    pub active_specialist: SpecialistId,
}

pub struct Orchestrator {
    specialists: HashMap<SpecialistId, Arc<dyn Specialist>>,
    dispatcher: ToolDispatcher,
    store: Arc<dyn SessionStore>,
    bank: Arc<dyn QuestionBank>,
    config: OrchestratorConfig,
    /// session_id → 轮级锁；锁表本身只在取锁的瞬间短暂持有
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        dispatcher: ToolDispatcher,
        bank: Arc<dyn QuestionBank>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            specialists: HashMap::new(),
            dispatcher,
            store,
            bank,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&mut self, specialist: Arc<dyn Specialist>) {
        let id = specialist.id();
        if self.specialists.insert(id, specialist).is_some() {
            tracing::warn!(specialist = %id, "Replacing an already registered specialist");
        }
    }

    /// 处理一次用户输入，返回最终回复与当前接管的专家。
    ///
    /// 同一会话内严格串行；配置类错误（未注册的专家/工具）降级为道歉回复，
    /// 循环触顶降级为兜底回复，两者都不会让调用方拿到 Err。
    pub async fn handle_turn(
        &self,
        session_id: &str,
        user_text: &str,
    ) -> Result<TurnOutcome, TutorError> {
        let lock = self.session_lock(session_id).await;
        let _turn = lock.lock().await;

        let mut session = self
            .store
            .load(session_id)
            .await?
            .unwrap_or_else(|| Session::new(session_id));
        let stored_quiz = self.store.load_quiz(session_id).await?;
        session.push(Message::user(user_text));
        let (reply, quiz, had_quiz) = self
            .run_decision_loop(&mut session, user_text, stored_quiz, session_id)
            .await;

        // 原子提交：整轮只写一次会话，测验状态随之同步
        session.touch();
        self.store.save(&session).await?;
        match (&quiz, had_quiz) {
            (Some(state), _) => self.store.save_quiz(state).await?,
            (None, true) => self.store.clear_quiz(session_id).await?,
            (None, false) => {}
        }

        Ok(TurnOutcome {
            reply,
            active_specialist: session.active,
        })
    }

    async fn run_decision_loop(
        &self,
        session: &mut Session,
        user_text: &str,
        mut quiz: Option<QuizState>,
        session_id: &str,
    ) -> (String, Option<QuizState>, bool) {
        let had_quiz = quiz.is_some();
        let mut reply = None;

        for step in 0..self.config.max_steps {
            let active = session.active;
            let Some(specialist) = self.specialists.get(&active).cloned() else {
                tracing::error!(
                    error = %TutorError::UnknownSpecialist(active.to_string()),
                    session_id,
                    "Routing hit an unregistered specialist"
                );
                reply = Some(APOLOGY_REPLY.to_string());
                session.push(Message::specialist(APOLOGY_REPLY));
                break;
            };

            let decision = {
                let mut ctx = TurnContext {
                    session_id,
                    history: &session.messages,
                    user_text,
                    quiz: &mut quiz,
                };
                specialist.decide(&mut ctx).await
            };

            match decision {
                Ok(Action::Reply(text)) => {
                    session.push(Message::specialist(text.clone()));
                    reply = Some(text);
                    break;
                }
                Ok(Action::ToolCall { tool, args }) => {
                    match self.dispatcher.dispatch(&tool, args).await {
                        Ok(record) => {
                            let note = match (&record.result, &record.failure) {
                                (Some(output), _) => {
                                    format!("Observation from {}: {}", tool, output)
                                }
                                (None, Some(reason)) => format!("{} failed: {}", tool, reason),
                                (None, None) => format!("{} returned nothing", tool),
                            };
                            session.push(Message::tool(note, record));
                        }
                        Err(error) => {
                            // 只有 UnknownTool 会走到这里：专家请求了未注册的工具
                            tracing::error!(%error, session_id, step, "Tool dispatch rejected");
                            session.push(Message::specialist(APOLOGY_REPLY));
                            reply = Some(APOLOGY_REPLY.to_string());
                            break;
                        }
                    }
                }
                Ok(Action::Handoff { target, reason }) => {
                    if !self.specialists.contains_key(&target) {
                        tracing::error!(
                            error = %TutorError::UnknownSpecialist(target.to_string()),
                            session_id,
                            "Handoff points at an unregistered specialist"
                        );
                        session.push(Message::specialist(APOLOGY_REPLY));
                        reply = Some(APOLOGY_REPLY.to_string());
                        break;
                    }
                    tracing::info!(from = %active, to = %target, %reason, session_id, "Handoff");
                    session.push(Message::handoff(active, target, reason));
                    session.active = target;
                }
                Err(error) => {
                    tracing::error!(%error, specialist = %active, session_id, "Specialist failed");
                    session.push(Message::specialist(APOLOGY_REPLY));
                    reply = Some(APOLOGY_REPLY.to_string());
                    break;
                }
            }
        }

        let reply = reply.unwrap_or_else(|| {
            tracing::warn!(
                error = %TutorError::OrchestrationLoopExceeded(self.config.max_steps),
                session_id,
                "Decision loop hit the step cap"
            );
            session.push(Message::specialist(FALLBACK_REPLY));
            FALLBACK_REPLY.to_string()
        });
        (reply, quiz, had_quiz)
    }

    /// 直接发起测验（绕过关键词路由），返回初始摘要。
    /// 历史里会留下一条合成的请求消息，后续答题轮照常走 handle_turn。
    pub async fn start_quiz(
        &self,
        session_id: &str,
        topic: &str,
    ) -> Result<QuizSummary, TutorError> {
        let lock = self.session_lock(session_id).await;
        let _turn = lock.lock().await;

        let mut session = self
            .store
            .load(session_id)
            .await?
            .unwrap_or_else(|| Session::new(session_id));

        let questions = self.bank.build(topic, self.config.questions_per_quiz);
        let quiz = QuizState::new(session_id, topic, questions)
            .map_err(|_| TutorError::EmptyQuiz(topic.to_string()))?;
        let summary = quiz.summary();

        session.push(Message::user(format!(
            "[quiz request] {} ({} questions)",
            topic,
            quiz.total()
        )));
        session.push(Message::specialist(format!(
            "Generated a {}-question quiz on {}. {}\nReply with the option letter or your short answer.",
            quiz.total(),
            topic,
            quiz.format_current_question()
        )));
        session.active = SpecialistId::QuizCoach;
        session.touch();

        self.store.save(&session).await?;
        self.store.save_quiz(&quiz).await?;
        tracing::info!(session_id, topic, questions = quiz.total(), "Quiz started");
        Ok(summary)
    }

    pub async fn quiz_summary(
        &self,
        session_id: &str,
    ) -> Result<Option<QuizSummary>, TutorError> {
        Ok(self
            .store
            .load_quiz(session_id)
            .await?
            .map(|state| state.summary()))
    }

    pub async fn session_history(&self, session_id: &str) -> Result<Vec<Message>, TutorError> {
        Ok(self
            .store
            .load(session_id)
            .await?
            .map(|session| session.messages)
            .unwrap_or_default())
    }

    /// 大小写不敏感的子串检索，只匹配消息正文
    pub async fn search_history(
        &self,
        session_id: &str,
        keyword: &str,
    ) -> Result<Vec<Message>, TutorError> {
        let needle = keyword.to_lowercase();
        Ok(self
            .session_history(session_id)
            .await?
            .into_iter()
            .filter(|message| message.content.to_lowercase().contains(&needle))
            .collect())
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionMeta>, TutorError> {
        self.store.list().await
    }

    async fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::BuiltinQuestionBank;
    use crate::session::MemorySessionStore;
    use crate::tools::ToolRegistry;
    use async_trait::async_trait;

    struct LostHost;

    #[async_trait]
    impl Specialist for LostHost {
        fn id(&self) -> SpecialistId {
            SpecialistId::Host
        }

        async fn decide(&self, _ctx: &mut TurnContext<'_>) -> Result<Action, TutorError> {
            Ok(Action::Handoff {
                target: SpecialistId::Planner,
                reason: "needs planning".into(),
            })
        }
    }

    fn bare_orchestrator() -> Orchestrator {
        let registry = Arc::new(ToolRegistry::new());
        let dispatcher = ToolDispatcher::new(registry, 2, 10);
        Orchestrator::new(
            Arc::new(MemorySessionStore::new()),
            dispatcher,
            Arc::new(BuiltinQuestionBank::new()),
            OrchestratorConfig::default(),
        )
    }

    #[tokio::test]
    async fn handoff_to_unregistered_specialist_degrades_to_apology() {
        let mut orchestrator = bare_orchestrator();
        orchestrator.register(Arc::new(LostHost));

        let outcome = orchestrator.handle_turn("s1", "hello").await.unwrap();
        assert_eq!(outcome.reply, APOLOGY_REPLY);
        // 无效移交不落历史，只有用户消息和道歉回复
        let history = orchestrator.session_history("s1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[1].handoff.is_none());
        assert_eq!(outcome.active_specialist, SpecialistId::Host);
    }

    #[tokio::test]
    async fn unregistered_active_specialist_degrades_to_apology() {
        let orchestrator = bare_orchestrator();
        let outcome = orchestrator.handle_turn("s1", "hello").await.unwrap();
        assert_eq!(outcome.reply, APOLOGY_REPLY);
        assert_eq!(outcome.active_specialist, SpecialistId::Host);
    }

    #[tokio::test]
    async fn start_quiz_switches_active_specialist_and_persists_state() {
        let orchestrator = bare_orchestrator();
        let summary = orchestrator.start_quiz("s1", "algebra").await.unwrap();
        assert_eq!(summary.total_questions, 5);
        assert_eq!(summary.current_index, 0);

        let history = orchestrator.session_history("s1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].content.starts_with("[quiz request]"));

        let stored = orchestrator.quiz_summary("s1").await.unwrap().unwrap();
        assert_eq!(stored.topic, "algebra");
    }
}
