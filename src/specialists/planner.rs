//! Planner：课程规划专家
//!
//! 先调一次工具为计划打底（本地提示，或用户要链接时走搜索），
//! 拿到观察后输出结构化短计划：鼓励语 + Day 1..N 步骤（带话题与时长）+ 免费资源。
//! 工具失败不阻塞：降级为纯离线计划。

use async_trait::async_trait;

use crate::core::error::TutorError;
use crate::session::message::ToolCallRecord;
use crate::specialists::{extract_topic, Action, Specialist, SpecialistId, TurnContext};

/// 计划天数（原型为 3-7 天的现实计划）
const PLAN_DAYS: usize = 5;

const RESOURCE_KEYWORDS: &[&str] = &["resource", "link", "website", "url", "online"];

#[derive(Debug, Default)]
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self
    }

    fn build_plan(topic: &str, grounding: Option<&ToolCallRecord>) -> String {
        let steps = [
            format!("Day 1: Read or review the basics of {topic} (~30 min)"),
            format!("Day 2: Work through 3 solved examples of {topic} (~30 min)"),
            format!("Day 3: Practice {topic} exercises on your own (~40 min)"),
            format!("Day 4: Self-quiz on {topic} and note the weak spots (~30 min)"),
            format!("Day 5: Recap {topic} by explaining it to a friend (~20 min)"),
        ];

        let mut plan = format!(
            "You've got this - a few focused days on {} will make a real difference.\n\n{}",
            topic,
            steps[..PLAN_DAYS].join("\n")
        );

        match grounding {
            Some(record) if record.is_success() => {
                if let Some(ref result) = record.result {
                    plan.push_str("\n\nHelpful notes:\n");
                    plan.push_str(result);
                }
            }
            Some(_) => {
                plan.push_str(
                    "\n\n(I couldn't reach extra resources right now, \
                     but the plan above works fully offline.)",
                );
            }
            None => {}
        }

        plan
    }
}

#[async_trait]
impl Specialist for Planner {
    fn id(&self) -> SpecialistId {
        SpecialistId::Planner
    }

    async fn decide(&self, ctx: &mut TurnContext<'_>) -> Result<Action, TutorError> {
        let topic = extract_topic(ctx.user_text);

        // 本轮已有工具观察（成功或失败都算）：产出最终计划
        if let Some(record) = ctx.last_tool_record() {
            return Ok(Action::Reply(Self::build_plan(&topic, Some(record))));
        }

        let lower = ctx.user_text.to_lowercase();
        let wants_links = RESOURCE_KEYWORDS.iter().any(|k| lower.contains(k));
        if wants_links {
            Ok(Action::ToolCall {
                tool: "web_search".to_string(),
                args: serde_json::json!({
                    "query": format!("free {} study resources", topic)
                }),
            })
        } else {
            Ok(Action::ToolCall {
                tool: "local_tip".to_string(),
                args: serde_json::json!({ "topic": topic }),
            })
        }
    }
}
