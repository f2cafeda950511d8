//! local_tip 工具：离线话题提示
//!
//! 按话题键查静态「话题 → 学习提示」表，面向低资源教育场景（可离线阅读的 2-4 条要点）。
//! 可用 data/topics.json 覆盖/扩充内置表；查不到的话题返回可用话题列表，不算失败。

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::registry::{Tool, ToolError};

pub struct LocalTipTool {
    tips: BTreeMap<String, Vec<String>>,
}

impl LocalTipTool {
    pub fn new() -> Self {
        Self {
            tips: builtin_tips(),
        }
    }

    /// 内置表 + JSON 文件合并（文件中的键覆盖内置键）；文件缺失或损坏时仅用内置表
    pub fn with_data_file(path: impl AsRef<Path>) -> Self {
        let mut tips = builtin_tips();
        match std::fs::read_to_string(path.as_ref()) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, Vec<String>>>(&raw) {
                Ok(loaded) => {
                    for (k, v) in loaded {
                        tips.insert(normalize_key(&k), v);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = ?path.as_ref(), "Ignoring malformed tips file: {}", e);
                }
            },
            Err(_) => {
                tracing::debug!(path = ?path.as_ref(), "No tips file, using builtin table");
            }
        }
        Self { tips }
    }
}

impl Default for LocalTipTool {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_key(topic: &str) -> String {
    topic.trim().to_lowercase().replace([' ', '-'], "_")
}

fn builtin_tips() -> BTreeMap<String, Vec<String>> {
    let entries: [(&str, &[&str]); 5] = [
        (
            "fractions",
            &[
                "Draw pictures: cut circles or rectangles into equal parts before using numbers.",
                "Practice with real objects like bread or fruit shared between people.",
                "Always find a common denominator before adding or subtracting.",
            ],
        ),
        (
            "algebra",
            &[
                "Treat the equals sign as a balance: whatever you do to one side, do to the other.",
                "Replace letters with small numbers first to see what an expression means.",
                "Solve many short problems rather than a few long ones.",
            ],
        ),
        (
            "english_vocab",
            &[
                "Keep a small paper notebook of new words and review it daily.",
                "Learn words in short sentences, never in isolation.",
                "Reuse each new word in your own sentence within a day.",
            ],
        ),
        (
            "science_environment",
            &[
                "Observe your surroundings: local plants and weather are free study material.",
                "Explain each concept to a friend in your own words.",
                "Connect every topic to one everyday example you can see.",
            ],
        ),
        (
            "study_skills",
            &[
                "Study in short daily sessions of 25-30 minutes instead of long cramming.",
                "Test yourself from memory before re-reading notes.",
                "Sleep and breaks are part of studying, not time lost.",
            ],
        ),
    ];
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
        .collect()
}

#[async_trait]
impl Tool for LocalTipTool {
    fn name(&self) -> &str {
        "local_tip"
    }

    fn description(&self) -> &str {
        "Offline study tips for a topic key like 'fractions' or 'algebra'"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "topic": { "type": "string", "description": "short topic key" }
            },
            "required": ["topic"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let topic = args
            .get("topic")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArgs("missing 'topic'".to_string()))?;

        let key = normalize_key(topic);
        match self.tips.get(&key) {
            Some(tips) => {
                let bullets: Vec<String> = tips.iter().map(|t| format!("- {}", t)).collect();
                Ok(format!(
                    "Practical local tips for {}:\n{}",
                    topic,
                    bullets.join("\n")
                ))
            }
            None => {
                let available: Vec<&str> = self.tips.keys().map(String::as_str).collect();
                Ok(format!(
                    "Sorry, no local tips for '{}'. Available topics: {}",
                    topic,
                    available.join(", ")
                ))
            }
        }
    }
}
