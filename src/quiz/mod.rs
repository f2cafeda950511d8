//! 测验状态机
//!
//! 状态：NotStarted（以 QuizState 不存在表示）→ InProgress → Completed。
//! current_index 单调递增且不超过题目数；得分逐题累加，绝不重算。

pub mod bank;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bank::{BuiltinQuestionBank, QuestionBank};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    /// 终态测验拒绝继续作答
    #[error("quiz already complete")]
    AlreadyComplete,
    /// 创建测验要求非空题目序列
    #[error("a quiz needs at least one question")]
    Empty,
}

/// 单道题：options 为空表示简答题，非空表示选择题（顺序仅影响展示，不影响判分）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub topic: String,
    /// 正确答案：简答题为答案文本，选择题为正确选项的文本
    pub answer: String,
    #[serde(default)]
    pub options: Vec<String>,
}

impl Question {
    pub fn free_text(
        prompt: impl Into<String>,
        topic: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            topic: topic.into(),
            answer: answer.into(),
            options: Vec::new(),
        }
    }

    pub fn multiple_choice(
        prompt: impl Into<String>,
        topic: impl Into<String>,
        answer: impl Into<String>,
        options: Vec<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            topic: topic.into(),
            answer: answer.into(),
            options,
        }
    }

    /// 判分：简答题做大小写无关的精确匹配；
    /// 选择题接受选项字母（a/b/...）、选项序号（1 起）或选项全文
    pub fn grade(&self, submitted: &str) -> bool {
        let submitted = submitted.trim();
        if self.options.is_empty() {
            return submitted.eq_ignore_ascii_case(self.answer.trim());
        }

        let picked = self.pick_option(submitted);
        match picked {
            Some(option) => option.eq_ignore_ascii_case(self.answer.trim()),
            None => submitted.eq_ignore_ascii_case(self.answer.trim()),
        }
    }

    /// 将提交文本解析为选项：单字母按 a=0 序，纯数字按 1 起的序号
    fn pick_option(&self, submitted: &str) -> Option<&str> {
        let lower = submitted.to_ascii_lowercase();
        if lower.len() == 1 {
            let c = lower.chars().next()?;
            if c.is_ascii_lowercase() {
                let idx = (c as usize) - ('a' as usize);
                return self.options.get(idx).map(String::as_str);
            }
        }
        if let Ok(n) = lower.parse::<usize>() {
            if n >= 1 {
                return self.options.get(n - 1).map(String::as_str);
            }
        }
        self.options
            .iter()
            .find(|o| o.eq_ignore_ascii_case(submitted))
            .map(String::as_str)
    }
}

/// 已记录的作答
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Answer {
    pub question_index: usize,
    pub submitted: String,
    pub correct: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    InProgress,
    Completed,
}

/// 一次作答的结果（供测验教练组织反馈文案）
#[derive(Clone, Debug)]
pub struct AnswerOutcome {
    pub question_index: usize,
    pub correct: bool,
    pub correct_answer: String,
}

/// 测验摘要（对外暴露的只读视图）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizSummary {
    pub session_id: String,
    pub topic: String,
    pub total_questions: usize,
    pub current_index: usize,
    pub score: usize,
    pub status: QuizStatus,
}

/// 进行中（或已完成待归档）的测验状态，与会话一一对应
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizState {
    pub session_id: String,
    pub topic: String,
    pub questions: Vec<Question>,
    pub current_index: usize,
    pub answers: Vec<Answer>,
    pub score: usize,
    pub status: QuizStatus,
}

impl QuizState {
    /// NotStarted → InProgress：要求非空题目序列
    pub fn new(
        session_id: impl Into<String>,
        topic: impl Into<String>,
        questions: Vec<Question>,
    ) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::Empty);
        }
        Ok(Self {
            session_id: session_id.into(),
            topic: topic.into(),
            questions,
            current_index: 0,
            answers: Vec::new(),
            score: 0,
            status: QuizStatus::InProgress,
        })
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn is_complete(&self) -> bool {
        self.status == QuizStatus::Completed
    }

    /// 当前待答题目；终态返回 None
    pub fn current_question(&self) -> Option<&Question> {
        if self.is_complete() {
            return None;
        }
        self.questions.get(self.current_index)
    }

    /// 提交一次作答：判分、记录、推进下标；到末尾则转入 Completed。
    /// 终态提交不改变任何状态，返回 AlreadyComplete。
    pub fn submit(&mut self, submitted: &str) -> Result<AnswerOutcome, QuizError> {
        let Some(question) = self.current_question() else {
            return Err(QuizError::AlreadyComplete);
        };

        let correct = question.grade(submitted);
        let correct_answer = question.answer.clone();
        let question_index = self.current_index;

        self.answers.push(Answer {
            question_index,
            submitted: submitted.trim().to_string(),
            correct,
            timestamp: Utc::now(),
        });
        if correct {
            self.score += 1;
        }
        self.current_index += 1;
        if self.current_index >= self.questions.len() {
            self.status = QuizStatus::Completed;
        }

        Ok(AnswerOutcome {
            question_index,
            correct,
            correct_answer,
        })
    }

    /// 当前题目的展示文本："Question i of N: ..." + 选项字母行；终态返回空串
    pub fn format_current_question(&self) -> String {
        let Some(question) = self.current_question() else {
            return String::new();
        };
        let mut text = format!(
            "Question {} of {}: {}",
            self.current_index + 1,
            self.total(),
            question.prompt
        );
        for (i, option) in question.options.iter().enumerate() {
            let letter = (b'A' + i as u8) as char;
            text.push_str(&format!("\n  {}) {}", letter, option));
        }
        text
    }

    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            session_id: self.session_id.clone(),
            topic: self.topic.clone(),
            total_questions: self.questions.len(),
            current_index: self.current_index,
            score: self.score,
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_question_quiz() -> QuizState {
        QuizState::new(
            "s1",
            "algebra",
            vec![
                Question::free_text("What is 2x when x = 3?", "algebra", "6"),
                Question::multiple_choice(
                    "Which is a linear equation?",
                    "algebra",
                    "y = 2x + 1",
                    vec!["y = x^2".into(), "y = 2x + 1".into(), "y = 1/x".into()],
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn creation_requires_questions() {
        assert_eq!(
            QuizState::new("s1", "algebra", vec![]).unwrap_err(),
            QuizError::Empty
        );
    }

    #[test]
    fn correct_answer_advances_and_scores() {
        let mut quiz = two_question_quiz();
        let outcome = quiz.submit("6").unwrap();
        assert!(outcome.correct);
        assert_eq!(quiz.score, 1);
        assert_eq!(quiz.current_index, 1);
        assert_eq!(quiz.status, QuizStatus::InProgress);
    }

    #[test]
    fn incorrect_answer_advances_without_scoring() {
        let mut quiz = two_question_quiz();
        let outcome = quiz.submit("7").unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.correct_answer, "6");
        assert_eq!(quiz.score, 0);
        assert_eq!(quiz.current_index, 1);
    }

    #[test]
    fn multiple_choice_accepts_letter_number_and_text() {
        let q = Question::multiple_choice(
            "pick",
            "algebra",
            "y = 2x + 1",
            vec!["y = x^2".into(), "y = 2x + 1".into(), "y = 1/x".into()],
        );
        assert!(q.grade("b"));
        assert!(q.grade("B"));
        assert!(q.grade("2"));
        assert!(q.grade("y = 2x + 1"));
        assert!(!q.grade("a"));
        assert!(!q.grade("3"));
    }

    #[test]
    fn exhausting_questions_reaches_terminal_state() {
        let mut quiz = two_question_quiz();
        quiz.submit("6").unwrap();
        quiz.submit("b").unwrap();
        assert!(quiz.is_complete());
        assert_eq!(quiz.score, 2);
        assert_eq!(quiz.current_index, quiz.total());
    }

    #[test]
    fn terminal_quiz_rejects_answers_without_state_change() {
        let mut quiz = two_question_quiz();
        quiz.submit("6").unwrap();
        quiz.submit("a").unwrap();
        let before = (quiz.score, quiz.current_index, quiz.answers.len());

        assert_eq!(quiz.submit("b").unwrap_err(), QuizError::AlreadyComplete);
        assert_eq!(quiz.submit("b").unwrap_err(), QuizError::AlreadyComplete);
        assert_eq!(before, (quiz.score, quiz.current_index, quiz.answers.len()));
    }

    #[test]
    fn index_never_exceeds_question_count() {
        let mut quiz = two_question_quiz();
        let mut last = quiz.current_index;
        for answer in ["6", "b", "x", "y"] {
            let _ = quiz.submit(answer);
            assert!(quiz.current_index >= last);
            assert!(quiz.current_index <= quiz.total());
            last = quiz.current_index;
        }
    }
}
