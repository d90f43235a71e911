//! Web search tool backed by a SearchAPI-compatible endpoint.
//!
//! Sends `GET {endpoint}?q=..&api_key=..&engine=..` and returns the top
//! `organic_results`. Each search draws from a run-scoped [`CallCounter`];
//! once it is exhausted the tool refuses until the counters are reset.

use async_trait::async_trait;
use stepwise_config::WebSearchConfig;
use stepwise_core::counter::{CallCounter, RunCounters};
use stepwise_core::error::ToolError;
use stepwise_core::tool::Tool;

/// How many organic results are returned to the model.
pub const MAX_RESULTS: usize = 5;

const TOOL_NAME: &str = "web_search";

pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    engine: String,
    counter: CallCounter,
}

impl WebSearchTool {
    /// Build the tool, registering its counter in `counters`.
    pub fn new(config: &WebSearchConfig, counters: &RunCounters) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            engine: config.engine.clone(),
            counter: counters.counter(TOOL_NAME, Some(config.max_calls_per_run)),
        }
    }

    fn failed(reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason: reason.into(),
        }
    }
}

/// Pick the first [`MAX_RESULTS`] organic results out of a response body.
pub fn top_results(body: &serde_json::Value) -> Result<String, ToolError> {
    let results = body["organic_results"]
        .as_array()
        .ok_or_else(|| WebSearchTool::failed("response has no organic_results"))?;

    let top: Vec<&serde_json::Value> = results.iter().take(MAX_RESULTS).collect();
    if top.is_empty() {
        return Ok("No results found.".into());
    }
    serde_json::to_string(&top).map_err(|e| WebSearchTool::failed(e.to_string()))
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns the top results with titles, links, and snippets."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query keywords"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let query = arguments["query"]
            .as_str()
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Self::failed("no search API key configured"))?;

        let used = self.counter.try_acquire().map_err(|limit| ToolError::LimitExceeded {
            tool_name: TOOL_NAME.into(),
            limit,
        })?;
        tracing::debug!(query, used, limit = ?self.counter.limit(), "Running web search");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("api_key", api_key), ("engine", self.engine.as_str())])
            .send()
            .await
            .map_err(|e| Self::failed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::failed(format!("search endpoint returned {status}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Self::failed(format!("invalid response: {e}")))?;

        top_results(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    type RequestLog = Arc<Mutex<Vec<String>>>;

    /// Serve `body` as JSON to every connection on a local port, recording
    /// each request line.
    async fn serve_json(body: &'static str) -> (String, RequestLog) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let log = RequestLog::default();
        let seen = log.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]);
                if let Some(line) = request.lines().next() {
                    seen.lock().unwrap().push(line.to_string());
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}/search"), log)
    }

    fn config(endpoint: String, max_calls: u32) -> WebSearchConfig {
        WebSearchConfig {
            endpoint,
            api_key: Some("test-key".into()),
            engine: "google".into(),
            max_calls_per_run: max_calls,
        }
    }

    #[test]
    fn top_results_limits_to_five() {
        let results: Vec<serde_json::Value> = (0..8)
            .map(|i| serde_json::json!({ "title": format!("r{i}") }))
            .collect();
        let body = serde_json::json!({ "organic_results": results });
        let output = top_results(&body).unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.len(), 5);
        assert_eq!(parsed[4]["title"], "r4");
    }

    #[test]
    fn missing_organic_results_is_error() {
        assert!(top_results(&serde_json::json!({ "error": "bad key" })).is_err());
        assert_eq!(
            top_results(&serde_json::json!({ "organic_results": [] })).unwrap(),
            "No results found."
        );
    }

    #[tokio::test]
    async fn search_hits_endpoint_and_respects_limit() {
        let (endpoint, _) =
            serve_json(r#"{"organic_results":[{"title":"Rust","link":"https://rust-lang.org"}]}"#).await;
        let counters = RunCounters::new();
        let tool = WebSearchTool::new(&config(endpoint, 1), &counters);

        let output = tool
            .execute(serde_json::json!({ "query": "rust language" }))
            .await
            .unwrap();
        assert!(output.contains("rust-lang.org"));
        assert_eq!(counters.count("web_search"), Some(1));

        let err = tool
            .execute(serde_json::json!({ "query": "again" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::LimitExceeded { limit: 1, .. }));

        counters.reset_all();
        assert!(tool.execute(serde_json::json!({ "query": "after reset" })).await.is_ok());
    }

    #[tokio::test]
    async fn search_sends_query_key_and_engine() {
        let (endpoint, log) = serve_json(r#"{"organic_results":[]}"#).await;
        let tool = WebSearchTool::new(&config(endpoint, 3), &RunCounters::new());

        tool.execute(serde_json::json!({ "query": "rust language" }))
            .await
            .unwrap();

        let lines = log.lock().unwrap().clone();
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            "GET /search?q=rust+language&api_key=test-key&engine=google HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn missing_key_does_not_consume_budget() {
        let counters = RunCounters::new();
        let mut cfg = config("http://127.0.0.1:9/search".into(), 3);
        cfg.api_key = None;
        let tool = WebSearchTool::new(&cfg, &counters);

        let err = tool
            .execute(serde_json::json!({ "query": "anything" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("API key"));
        assert_eq!(counters.count("web_search"), Some(0));
    }

    #[tokio::test]
    async fn missing_query_returns_error() {
        let tool = WebSearchTool::new(&config("http://127.0.0.1:9".into(), 3), &RunCounters::new());
        let result = tool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
