//! 题库
//!
//! 题目来源做成可插拔：内置静态题库覆盖常见话题，未知话题回退到通用学习法题组，
//! 保证任何话题都能开出非空测验。

use crate::quiz::Question;

/// 题库接口：按话题给出至多 count 道题
pub trait QuestionBank: Send + Sync {
    fn build(&self, topic: &str, count: usize) -> Vec<Question>;
}

/// 内置静态题库：algebra / fractions / english_vocab / science_environment + 通用回退
#[derive(Debug, Default)]
pub struct BuiltinQuestionBank;

impl BuiltinQuestionBank {
    pub fn new() -> Self {
        Self
    }

    fn algebra(topic: &str) -> Vec<Question> {
        vec![
            Question::free_text("If x + 3 = 7, what is x?", topic, "4"),
            Question::multiple_choice(
                "Which of these is a linear equation?",
                topic,
                "y = 2x + 1",
                vec!["y = x^2".into(), "y = 2x + 1".into(), "y = 1/x".into(), "y = x^3 - 2".into()],
            ),
            Question::free_text("What is 3x when x = 5?", topic, "15"),
            Question::multiple_choice(
                "What does the coefficient in 4y mean?",
                topic,
                "y is multiplied by 4",
                vec![
                    "y is added to 4".into(),
                    "y is multiplied by 4".into(),
                    "y is divided by 4".into(),
                    "4 is subtracted from y".into(),
                ],
            ),
            Question::free_text("Solve for x: 2x = 10", topic, "5"),
        ]
    }

    fn fractions(topic: &str) -> Vec<Question> {
        vec![
            Question::free_text("What is 1/2 + 1/4, as a fraction?", topic, "3/4"),
            Question::multiple_choice(
                "Which fraction is equivalent to 2/4?",
                topic,
                "1/2",
                vec!["1/2".into(), "2/3".into(), "3/4".into(), "1/4".into()],
            ),
            Question::multiple_choice(
                "In the fraction 3/5, what is the 5 called?",
                topic,
                "denominator",
                vec!["numerator".into(), "denominator".into(), "quotient".into(), "remainder".into()],
            ),
            Question::free_text("What is 1/3 of 9?", topic, "3"),
            Question::multiple_choice(
                "Which is larger?",
                topic,
                "3/4",
                vec!["2/4".into(), "3/4".into(), "1/4".into()],
            ),
        ]
    }

    fn english_vocab(topic: &str) -> Vec<Question> {
        vec![
            Question::multiple_choice(
                "Which word means the same as 'happy'?",
                topic,
                "joyful",
                vec!["angry".into(), "joyful".into(), "tired".into(), "hungry".into()],
            ),
            Question::multiple_choice(
                "Which word is the opposite of 'difficult'?",
                topic,
                "easy",
                vec!["hard".into(), "easy".into(), "heavy".into(), "slow".into()],
            ),
            Question::free_text("Complete: a group of students is called a ____", topic, "class"),
            Question::multiple_choice(
                "Which sentence is correct?",
                topic,
                "She goes to school every day.",
                vec![
                    "She go to school every day.".into(),
                    "She goes to school every day.".into(),
                    "She going to school every day.".into(),
                ],
            ),
            Question::free_text("What is the past tense of 'study'?", topic, "studied"),
        ]
    }

    fn science_environment(topic: &str) -> Vec<Question> {
        vec![
            Question::multiple_choice(
                "What gas do plants absorb from the air?",
                topic,
                "carbon dioxide",
                vec!["oxygen".into(), "carbon dioxide".into(), "nitrogen".into(), "helium".into()],
            ),
            Question::free_text("What is the process plants use to make food called?", topic, "photosynthesis"),
            Question::multiple_choice(
                "Which of these is a renewable energy source?",
                topic,
                "solar power",
                vec!["coal".into(), "oil".into(), "solar power".into(), "natural gas".into()],
            ),
            Question::multiple_choice(
                "Recycling mainly helps the environment by...",
                topic,
                "reducing waste",
                vec!["making rain".into(), "reducing waste".into(), "heating homes".into()],
            ),
            Question::free_text("What do we call water falling from clouds?", topic, "rain"),
        ]
    }

    /// 未知话题的回退题组：围绕学习方法本身出题，带上请求的话题标签
    fn generic(topic: &str) -> Vec<Question> {
        vec![
            Question::multiple_choice(
                &format!("When studying {}, what is a good first step?", topic),
                topic,
                "review the basic concepts",
                vec![
                    "skip to the hardest problems".into(),
                    "review the basic concepts".into(),
                    "memorize everything at once".into(),
                ],
            ),
            Question::multiple_choice(
                "How often should you review new material to remember it?",
                topic,
                "a little every day",
                vec![
                    "once, the night before a test".into(),
                    "a little every day".into(),
                    "never, reading once is enough".into(),
                ],
            ),
            Question::multiple_choice(
                "What should you do when you get a practice question wrong?",
                topic,
                "read the explanation and retry a similar one",
                vec![
                    "give up on the topic".into(),
                    "read the explanation and retry a similar one".into(),
                    "ignore it".into(),
                ],
            ),
        ]
    }
}

impl QuestionBank for BuiltinQuestionBank {
    fn build(&self, topic: &str, count: usize) -> Vec<Question> {
        let key = topic.trim().to_lowercase();
        let mut questions = if key.contains("algebra") || key.contains("equation") {
            Self::algebra(topic)
        } else if key.contains("fraction") {
            Self::fractions(topic)
        } else if key.contains("english") || key.contains("vocab") || key.contains("grammar") {
            Self::english_vocab(topic)
        } else if key.contains("science") || key.contains("environment") || key.contains("nature") {
            Self::science_environment(topic)
        } else {
            Self::generic(topic)
        };
        questions.truncate(count.max(1));
        questions
    }
}
