//! web_search 工具
//!
//! 调用 OpenSearch 风格端点（默认维基百科 API），返回带标题/摘要/链接的排序结果。
//! 网络错误、非 2xx、响应解析失败都归为 Unavailable，由分发器重试与降级，
//! 绝不把搜索失败变成整轮对话的失败。

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::tools::registry::{Tool, ToolError};

const USER_AGENT: &str = "studypath/0.1 (education assistant)";

pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64, max_results: usize) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            max_results: max_results.max(1),
        }
    }

    async fn search(&self, query: &str) -> Result<String, ToolError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "opensearch"),
                ("search", query),
                ("limit", &self.max_results.to_string()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| ToolError::Unavailable(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ToolError::Unavailable(format!("HTTP {}", resp.status())));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ToolError::Unavailable(format!("bad response body: {e}")))?;

        // OpenSearch 响应为 [query, [titles], [snippets], [urls]]
        let titles = body.get(1).and_then(Value::as_array);
        let snippets = body.get(2).and_then(Value::as_array);
        let urls = body.get(3).and_then(Value::as_array);
        let (Some(titles), Some(snippets), Some(urls)) = (titles, snippets, urls) else {
            return Err(ToolError::Unavailable(
                "unexpected response shape".to_string(),
            ));
        };

        let mut lines = Vec::new();
        for (rank, title) in titles.iter().enumerate().take(self.max_results) {
            let title = title.as_str().unwrap_or_default();
            let url = urls.get(rank).and_then(Value::as_str).unwrap_or_default();
            let snippet = snippets
                .get(rank)
                .and_then(Value::as_str)
                .unwrap_or_default();
            if snippet.is_empty() {
                lines.push(format!("{}. {} - {}", rank + 1, title, url));
            } else {
                lines.push(format!("{}. {} - {}\n   {}", rank + 1, title, url, snippet));
            }
        }

        if lines.is_empty() {
            Ok(format!("No results found for '{}'.", query))
        } else {
            Ok(lines.join("\n"))
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for free learning resources; returns ranked title/snippet/url entries"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "search query" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArgs("missing 'query'".to_string()))?;
        self.search(query.trim()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_query_is_invalid_args() {
        let tool = WebSearchTool::new("http://127.0.0.1:9/api", 1, 3);
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgs(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        // 端口 9（discard）拒绝连接，得到确定性的网络失败
        let tool = WebSearchTool::new("http://127.0.0.1:9/api", 1, 3);
        let err = tool
            .execute(serde_json::json!({"query": "fractions"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Unavailable(_)));
    }
}
