//! 工具分发器
//!
//! 持有 ToolRegistry 与超时/退避参数：每次调用加超时；瞬时失败（Unavailable/超时）
//! 退避后重试一次，仍失败则把失败原因写进 ToolCallRecord 交回编排器降级处理。
//! 未注册的工具名属于配置错误，作为 Err 上抛。每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::{sleep, timeout};

use crate::core::error::TutorError;
use crate::session::message::ToolCallRecord;
use crate::tools::registry::{Tool, ToolError, ToolRegistry};

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
    retry_backoff: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64, retry_backoff_ms: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            retry_backoff: Duration::from_millis(retry_backoff_ms),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 分发一次工具调用；返回的记录中结果与失败原因二者必居其一
    pub async fn dispatch(&self, tool_name: &str, args: Value) -> Result<ToolCallRecord, TutorError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| TutorError::UnknownTool(tool_name.to_string()))?;

        let start = Instant::now();
        let mut attempt = self.attempt(tool.as_ref(), args.clone()).await;

        if let Err(ToolError::Unavailable(ref reason)) = attempt {
            tracing::warn!(tool = tool_name, %reason, "Tool unavailable, retrying once");
            sleep(self.retry_backoff).await;
            attempt = self.attempt(tool.as_ref(), args.clone()).await;
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let record = match attempt {
            Ok(result) => ToolCallRecord::success(tool_name, args, result, duration_ms),
            Err(e) => ToolCallRecord::failure(tool_name, args, e.to_string(), duration_ms),
        };

        let audit = serde_json::json!({
            "event": "tool_call",
            "tool": tool_name,
            "ok": record.is_success(),
            "duration_ms": duration_ms,
        });
        tracing::info!(target: "studypath::audit", "{}", audit);

        Ok(record)
    }

    /// 单次尝试：超时折算为 Unavailable，走同一条重试/降级路径
    async fn attempt(&self, tool: &dyn Tool, args: Value) -> Result<String, ToolError> {
        match timeout(self.timeout, tool.execute(args)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Unavailable(format!(
                "timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    /// 第一次调用失败、之后成功的工具，用于验证重试一次的行为
    struct FlakyTool {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Tool for FlakyTool {
        fn name(&self) -> &str {
            "flaky"
        }

        fn description(&self) -> &str {
            "fails on the first call"
        }

        async fn execute(&self, _args: Value) -> Result<String, ToolError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ToolError::Unavailable("connection reset".to_string()))
            } else {
                Ok("recovered".to_string())
            }
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "never finishes in time"
        }

        async fn execute(&self, _args: Value) -> Result<String, ToolError> {
            sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    struct StrictTool;

    #[async_trait]
    impl Tool for StrictTool {
        fn name(&self) -> &str {
            "strict"
        }

        fn description(&self) -> &str {
            "requires a 'key' argument"
        }

        async fn execute(&self, args: Value) -> Result<String, ToolError> {
            args.get("key")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ToolError::InvalidArgs("missing 'key'".to_string()))
        }
    }

    fn dispatcher_with(tool: impl Tool + 'static) -> ToolDispatcher {
        let mut registry = ToolRegistry::new();
        registry.register(tool);
        ToolDispatcher::new(Arc::new(registry), 1, 10)
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let dispatcher = dispatcher_with(FlakyTool {
            calls: AtomicUsize::new(0),
        });
        let record = dispatcher
            .dispatch("flaky", serde_json::json!({}))
            .await
            .unwrap();
        assert!(record.is_success());
        assert_eq!(record.result.as_deref(), Some("recovered"));
    }

    #[tokio::test]
    async fn timeout_becomes_a_failure_record() {
        let dispatcher = dispatcher_with(SlowTool);
        let record = dispatcher
            .dispatch("slow", serde_json::json!({}))
            .await
            .unwrap();
        assert!(!record.is_success());
        assert!(record.failure.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn invalid_args_are_not_retried() {
        let dispatcher = dispatcher_with(StrictTool);
        let record = dispatcher
            .dispatch("strict", serde_json::json!({}))
            .await
            .unwrap();
        assert!(!record.is_success());
        assert!(record.failure.unwrap().contains("invalid arguments"));
    }

    #[tokio::test]
    async fn unknown_tool_is_a_config_error() {
        let dispatcher = dispatcher_with(StrictTool);
        let err = dispatcher
            .dispatch("missing", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, TutorError::UnknownTool(_)));
    }
}
