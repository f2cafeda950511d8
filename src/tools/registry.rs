//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / execute），由 ToolRegistry 按名注册与查找；
//! 参数校验由各工具自己负责（InvalidArgs），网络类失败统一为 Unavailable，由分发器决定重试与降级。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// 工具自身的失败类型
#[derive(Debug, Error)]
pub enum ToolError {
    /// 策略生成的参数不符合工具的 schema
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    /// 瞬时外部失败（网络、超时、对端 5xx），分发器会重试一次
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// 工具 trait：名称、描述（供策略与日志）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认空对象表示无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// (name, description) 列表，供策略提示与诊断输出
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.tools
            .iter()
            .map(|(name, tool)| (name.clone(), tool.description().to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UpperTool;

    #[async_trait]
    impl Tool for UpperTool {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "uppercases text"
        }

        async fn execute(&self, args: Value) -> Result<String, ToolError> {
            let text = args
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidArgs("missing 'text'".to_string()))?;
            Ok(text.to_uppercase())
        }
    }

    #[tokio::test]
    async fn register_and_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(UpperTool);

        let tool = registry.get("upper").unwrap();
        let out = tool
            .execute(serde_json::json!({"text": "hi"}))
            .await
            .unwrap();
        assert_eq!(out, "HI");
        assert!(registry.get("nope").is_none());
    }

    #[tokio::test]
    async fn invalid_args_are_reported() {
        let mut registry = ToolRegistry::new();
        registry.register(UpperTool);
        let tool = registry.get("upper").unwrap();
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgs(_)));
    }
}
