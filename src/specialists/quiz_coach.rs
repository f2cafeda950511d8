//! QuizCoach：测验教练
//!
//! 首次激活且无测验状态时按话题从题库开一份新测验并给出第 1 题；
//! 之后把用户消息当作对当前题的作答：判分、记录、推进，回复反馈与下一题或总分。
//! 终态测验：像作答的消息得到友好的「已完成」提示（状态不变）；
//! 其它消息把测验归档并交还 Host——切换发生在总结之后的下一轮，不在总结当中。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::error::TutorError;
use crate::quiz::{QuestionBank, QuizError, QuizState};
use crate::specialists::{extract_topic, Action, Specialist, SpecialistId, TurnContext};

pub struct QuizCoach {
    bank: Arc<dyn QuestionBank>,
    questions_per_quiz: usize,
}

impl QuizCoach {
    pub fn new(bank: Arc<dyn QuestionBank>, questions_per_quiz: usize) -> Self {
        Self {
            bank,
            questions_per_quiz: questions_per_quiz.max(1),
        }
    }

    /// 为会话开一份新测验（状态写入 ctx.quiz），返回开场白 + 第 1 题
    pub fn start_quiz(&self, ctx: &mut TurnContext<'_>, topic: &str) -> Result<String, TutorError> {
        let questions = self.bank.build(topic, self.questions_per_quiz);
        let quiz = QuizState::new(ctx.session_id, topic, questions)
            .map_err(|_| TutorError::EmptyQuiz(topic.to_string()))?;

        let intro = format!(
            "Let's practice {}! {}\nReply with the option letter or your short answer.",
            topic,
            quiz.format_current_question()
        );
        *ctx.quiz = Some(quiz);
        Ok(intro)
    }

    /// 单个 token 视为作答尝试（选项字母、数字或短答案）
    fn looks_like_answer(text: &str) -> bool {
        text.split_whitespace().count() == 1
    }

    fn grade_turn(quiz: &mut QuizState, submitted: &str) -> String {
        match quiz.submit(submitted) {
            Ok(outcome) => {
                let mut reply = if outcome.correct {
                    "Correct! Nice work.".to_string()
                } else {
                    format!(
                        "Not quite - the right answer is \"{}\". Keep going, mistakes are how we learn.",
                        outcome.correct_answer
                    )
                };
                if quiz.is_complete() {
                    reply.push_str(&format!(
                        "\n\nThat's the end of the quiz! You scored {} out of {} on {}. \
                         Say \"quiz me on {}\" any time for another round.",
                        quiz.score,
                        quiz.total(),
                        quiz.topic,
                        quiz.topic
                    ));
                } else {
                    reply.push_str("\n\n");
                    reply.push_str(&quiz.format_current_question());
                }
                reply
            }
            // current_question 已拦截终态，此处只是防御
            Err(QuizError::AlreadyComplete) => already_complete_reply(quiz),
            Err(QuizError::Empty) => unreachable!("submit never reports an empty quiz"),
        }
    }
}

fn already_complete_reply(quiz: &QuizState) -> String {
    format!(
        "That quiz is already finished - you scored {} out of {} on {}. \
         Say \"quiz me on a topic\" to start a new one!",
        quiz.score,
        quiz.total(),
        quiz.topic
    )
}

#[async_trait]
impl Specialist for QuizCoach {
    fn id(&self) -> SpecialistId {
        SpecialistId::QuizCoach
    }

    async fn decide(&self, ctx: &mut TurnContext<'_>) -> Result<Action, TutorError> {
        match ctx.quiz.take() {
            // 无测验（含被放弃后的情况）：开一份新的
            None => {
                let topic = extract_topic(ctx.user_text);
                let intro = self.start_quiz(ctx, &topic)?;
                Ok(Action::Reply(intro))
            }
            Some(quiz) if quiz.is_complete() => {
                if Self::looks_like_answer(ctx.user_text) {
                    // 状态原样放回：重复提交必须幂等
                    let reply = already_complete_reply(&quiz);
                    *ctx.quiz = Some(quiz);
                    Ok(Action::Reply(reply))
                } else {
                    // 归档（take 后不放回），下一位专家接手
                    Ok(Action::Handoff {
                        target: SpecialistId::Host,
                        reason: format!("quiz on {} finished", quiz.topic),
                    })
                }
            }
            Some(mut quiz) => {
                let reply = Self::grade_turn(&mut quiz, ctx.user_text);
                *ctx.quiz = Some(quiz);
                Ok(Action::Reply(reply))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::BuiltinQuestionBank;
    use crate::session::message::Message;

    fn coach() -> QuizCoach {
        QuizCoach::new(Arc::new(BuiltinQuestionBank::new()), 3)
    }

    async fn decide(
        coach: &QuizCoach,
        text: &str,
        quiz: &mut Option<QuizState>,
    ) -> Action {
        let history = vec![Message::user(text)];
        let mut ctx = TurnContext {
            session_id: "s1",
            history: &history,
            user_text: text,
            quiz,
        };
        coach.decide(&mut ctx).await.unwrap()
    }

    #[tokio::test]
    async fn first_activation_creates_a_quiz() {
        let coach = coach();
        let mut quiz = None;
        let action = decide(&coach, "quiz me on algebra", &mut quiz).await;

        let Action::Reply(text) = action else {
            panic!("expected reply");
        };
        assert!(text.contains("Question 1 of 3"));
        let state = quiz.expect("quiz state created");
        assert_eq!(state.topic, "algebra");
        assert_eq!(state.current_index, 0);
    }

    #[tokio::test]
    async fn answers_advance_the_quiz() {
        let coach = coach();
        let mut quiz = None;
        decide(&coach, "quiz me on algebra", &mut quiz).await;

        // 第一道内置 algebra 题的答案是 4
        let action = decide(&coach, "4", &mut quiz).await;
        let Action::Reply(text) = action else {
            panic!("expected reply");
        };
        assert!(text.to_lowercase().contains("correct"));
        assert!(text.contains("Question 2 of 3"));
        let state = quiz.as_ref().unwrap();
        assert_eq!(state.current_index, 1);
        assert_eq!(state.score, 1);
    }

    #[tokio::test]
    async fn wrong_answer_reveals_the_right_one() {
        let coach = coach();
        let mut quiz = None;
        decide(&coach, "quiz me on algebra", &mut quiz).await;

        let action = decide(&coach, "99", &mut quiz).await;
        let Action::Reply(text) = action else {
            panic!("expected reply");
        };
        assert!(text.contains("Not quite"));
        assert!(text.contains("4"));
        assert_eq!(quiz.as_ref().unwrap().score, 0);
    }

    #[tokio::test]
    async fn finished_quiz_rejects_answers_idempotently() {
        let coach = coach();
        let mut quiz = None;
        decide(&coach, "quiz me on algebra", &mut quiz).await;
        decide(&coach, "4", &mut quiz).await;
        decide(&coach, "b", &mut quiz).await;
        decide(&coach, "15", &mut quiz).await;
        assert!(quiz.as_ref().unwrap().is_complete());
        let score = quiz.as_ref().unwrap().score;

        for _ in 0..2 {
            let action = decide(&coach, "b", &mut quiz).await;
            let Action::Reply(text) = action else {
                panic!("expected reply");
            };
            assert!(text.contains("already finished"));
            assert_eq!(quiz.as_ref().unwrap().score, score);
        }
    }

    #[tokio::test]
    async fn non_answer_after_completion_hands_back_to_host() {
        let coach = coach();
        let mut quiz = None;
        decide(&coach, "quiz me on algebra", &mut quiz).await;
        decide(&coach, "4", &mut quiz).await;
        decide(&coach, "b", &mut quiz).await;
        decide(&coach, "15", &mut quiz).await;

        let action = decide(&coach, "that was fun, what else can we do?", &mut quiz).await;
        assert!(matches!(
            action,
            Action::Handoff { target: SpecialistId::Host, .. }
        ));
        assert!(quiz.is_none(), "quiz is archived on handoff");
    }

    #[tokio::test]
    async fn abandoned_quiz_is_replaced_with_a_fresh_one() {
        let coach = coach();
        // 无测验状态却轮到教练（例如放弃后）：必须新开而不是报错
        let mut quiz = None;
        let action = decide(&coach, "more practice on fractions please", &mut quiz).await;
        let Action::Reply(text) = action else {
            panic!("expected reply");
        };
        assert!(text.contains("Question 1 of"));
        assert_eq!(quiz.unwrap().topic, "fractions");
    }
}
