//! Scoring pipeline — quote, news, placeholder score, streamed as events

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::events::ScoreEvent;
use finch_core::config::McpServerConfig;
use finch_core::tools::{ToolExecutor, ToolRegistry};
use finch_mcp::client::{McpClient, McpLaunch};

/// Tool name spellings seen across MCP server versions, best first
pub const QUOTE_TOOL_CANDIDATES: &[&str] = &["get_stock_info", "quote", "get_quote"];
pub const NEWS_TOOL_CANDIDATES: &[&str] = &["get_news", "news", "search_news", "get_company_news"];

/// Scoring request body. Wire names are camelCase.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub ticker: String,
    #[serde(default = "default_market")]
    pub market: String,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    #[serde(default = "default_true")]
    pub return_price_context: bool,
    #[serde(default = "default_lang")]
    pub lang: String,
}

fn default_market() -> String {
    "US".to_string()
}
fn default_lookback_days() -> u32 {
    3
}
fn default_sources() -> Vec<String> {
    vec!["news".to_string()]
}
fn default_true() -> bool {
    true
}
fn default_lang() -> String {
    "ko".to_string()
}

impl ScoreRequest {
    /// Lookback window must be 1..=30 days
    pub fn validate(&self) -> Result<(), String> {
        if self.lookback_days < 1 || self.lookback_days > 30 {
            return Err(format!(
                "lookbackDays must be between 1 and 30, got {}",
                self.lookback_days
            ));
        }
        Ok(())
    }
}

/// Parse tool output as JSON when it is JSON, else carry it as a string
fn tool_output_value(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// Run the full pipeline against the configured MCP server, emitting events
/// on `tx`. Ends with a `done` event; send failures mean the client went
/// away and the run stops quietly.
pub async fn run_score_pipeline(
    config: Arc<McpServerConfig>,
    request: ScoreRequest,
    tx: mpsc::Sender<ScoreEvent>,
) {
    let run = async {
        tx.send(ScoreEvent::progress(5, "Connecting to MCP server"))
            .await
            .ok()?;

        let client = match connect(&config).await {
            Ok(client) => client,
            Err(e) => {
                warn!("MCP connection failed: {}", e);
                tx.send(ScoreEvent::error("mcp", e.to_string())).await.ok()?;
                return Some(());
            }
        };

        let registry = match build_registry(&client).await {
            Ok(registry) => registry,
            Err(e) => {
                tx.send(ScoreEvent::error("mcp", e.to_string())).await.ok()?;
                client.shutdown().await;
                return Some(());
            }
        };

        let result = score_with_registry(&registry, &request, &tx).await;
        client.shutdown().await;
        result
    };

    if run.await.is_some() {
        let _ = tx.send(ScoreEvent::Done).await;
    }
    // None: receiver dropped mid-stream, nothing left to tell anyone
}

async fn connect(config: &McpServerConfig) -> anyhow::Result<Arc<McpClient>> {
    let launch = McpLaunch::from_config(config)?;
    McpClient::connect(launch).await
}

async fn build_registry(client: &Arc<McpClient>) -> anyhow::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for handler in client.discover_tools().await? {
        registry.register(handler);
    }
    Ok(registry)
}

/// The quote/news/score stages, given an already-populated registry.
///
/// Returns `None` when the receiver is gone.
pub async fn score_with_registry(
    registry: &ToolRegistry,
    request: &ScoreRequest,
    tx: &mpsc::Sender<ScoreEvent>,
) -> Option<()> {
    // 1) quote
    match registry.pick(QUOTE_TOOL_CANDIDATES) {
        Some(tool) => {
            tx.send(ScoreEvent::progress(15, format!("Fetching quote ({})", tool)))
                .await
                .ok()?;
            let args = serde_json::json!({ "ticker": request.ticker });
            match registry.execute(tool, args).await {
                Ok(text) => {
                    tx.send(ScoreEvent::Quote {
                        data: tool_output_value(text),
                    })
                    .await
                    .ok()?;
                }
                Err(e) => {
                    tx.send(ScoreEvent::error("quote", e.to_string())).await.ok()?;
                }
            }
        }
        None => {
            tx.send(ScoreEvent::error("quote", "No quote tool available"))
                .await
                .ok()?;
        }
    }

    // 2) news, only when requested and available
    if request.sources.iter().any(|s| s == "news") {
        if let Some(tool) = registry.pick(NEWS_TOOL_CANDIDATES) {
            tx.send(ScoreEvent::progress(45, format!("Collecting news ({})", tool)))
                .await
                .ok()?;
            let args = serde_json::json!({
                "ticker": request.ticker,
                "lookback_days": request.lookback_days,
            });
            match registry.execute(tool, args).await {
                Ok(text) => match tool_output_value(text) {
                    Value::Array(items) => {
                        for item in items {
                            tx.send(ScoreEvent::NewsItem { data: item }).await.ok()?;
                        }
                    }
                    other => {
                        tx.send(ScoreEvent::NewsItem { data: other }).await.ok()?;
                    }
                },
                Err(e) => {
                    tx.send(ScoreEvent::error("news", e.to_string())).await.ok()?;
                }
            }
        }
    }

    // 3) placeholder score until a model is wired in
    info!("Scoring {} ({}) — emitting default signal", request.ticker, request.market);
    tx.send(ScoreEvent::Score {
        signal: "HOLD".to_string(),
        score: 0.5,
        rationale: "Default score pending model integration".to_string(),
    })
    .await
    .ok()?;

    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use finch_core::tools::ToolHandler;

    #[test]
    fn test_request_defaults() {
        let req: ScoreRequest = serde_json::from_str(r#"{"ticker":"AAPL"}"#).unwrap();
        assert_eq!(req.ticker, "AAPL");
        assert_eq!(req.market, "US");
        assert_eq!(req.lookback_days, 3);
        assert_eq!(req.sources, vec!["news"]);
        assert!(req.return_price_context);
        assert_eq!(req.lang, "ko");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_request_camel_case_fields() {
        let req: ScoreRequest = serde_json::from_str(
            r#"{"ticker":"TSLA","lookbackDays":7,"returnPriceContext":false,"sources":[]}"#,
        )
        .unwrap();
        assert_eq!(req.lookback_days, 7);
        assert!(!req.return_price_context);
        assert!(req.sources.is_empty());
    }

    #[test]
    fn test_request_validation_bounds() {
        let mut req: ScoreRequest = serde_json::from_str(r#"{"ticker":"AAPL"}"#).unwrap();
        req.lookback_days = 0;
        assert!(req.validate().is_err());
        req.lookback_days = 31;
        assert!(req.validate().is_err());
        req.lookback_days = 30;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_tool_output_value() {
        assert_eq!(
            tool_output_value(r#"{"price": 1}"#.to_string()),
            serde_json::json!({"price": 1})
        );
        assert_eq!(
            tool_output_value("plain text".to_string()),
            Value::String("plain text".to_string())
        );
    }

    struct StubTool {
        name: &'static str,
        output: Result<String, String>,
    }

    #[async_trait]
    impl ToolHandler for StubTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "stub"
        }
        fn input_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _input: Value) -> Result<String> {
            self.output
                .clone()
                .map_err(|e| anyhow::anyhow!(e))
        }
    }

    fn request() -> ScoreRequest {
        serde_json::from_str(r#"{"ticker":"AAPL"}"#).unwrap()
    }

    async fn collect(registry: ToolRegistry, req: ScoreRequest) -> Vec<ScoreEvent> {
        let (tx, mut rx) = mpsc::channel(32);
        score_with_registry(&registry, &req, &tx).await;
        drop(tx);
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        events
    }

    #[tokio::test]
    async fn test_full_sequence_with_quote_and_news() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool {
            name: "get_stock_info",
            output: Ok(r#"{"price": 190.2}"#.to_string()),
        }));
        registry.register(Arc::new(StubTool {
            name: "get_news",
            output: Ok(r#"[{"headline":"a"},{"headline":"b"}]"#.to_string()),
        }));

        let events = collect(registry, request()).await;
        assert!(matches!(events[0], ScoreEvent::Progress { value: 15, .. }));
        assert!(matches!(events[1], ScoreEvent::Quote { .. }));
        assert!(matches!(events[2], ScoreEvent::Progress { value: 45, .. }));
        // News array fans out to one event per item
        let news: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, ScoreEvent::NewsItem { .. }))
            .collect();
        assert_eq!(news.len(), 2);
        assert!(matches!(events.last(), Some(ScoreEvent::Score { .. })));
    }

    #[tokio::test]
    async fn test_missing_quote_tool_reports_error() {
        let events = collect(ToolRegistry::new(), request()).await;
        assert!(events.iter().any(|e| matches!(
            e,
            ScoreEvent::Error { stage, .. } if stage == "quote"
        )));
        // Pipeline still finishes with a score
        assert!(matches!(events.last(), Some(ScoreEvent::Score { .. })));
    }

    #[tokio::test]
    async fn test_quote_failure_reports_stage_error() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool {
            name: "quote",
            output: Err("upstream down".to_string()),
        }));
        let events = collect(registry, request()).await;
        assert!(events.iter().any(|e| matches!(
            e,
            ScoreEvent::Error { stage, message } if stage == "quote" && message.contains("upstream")
        )));
    }

    #[tokio::test]
    async fn test_news_skipped_when_not_requested() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool {
            name: "get_stock_info",
            output: Ok("{}".to_string()),
        }));
        registry.register(Arc::new(StubTool {
            name: "get_news",
            output: Ok("[]".to_string()),
        }));
        let mut req = request();
        req.sources = vec![];
        let events = collect(registry, req).await;
        assert!(!events.iter().any(|e| matches!(e, ScoreEvent::NewsItem { .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, ScoreEvent::Progress { value: 45, .. })));
    }

    #[tokio::test]
    async fn test_non_array_news_is_single_item() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool {
            name: "get_stock_info",
            output: Ok("{}".to_string()),
        }));
        registry.register(Arc::new(StubTool {
            name: "news",
            output: Ok("breaking: text blob".to_string()),
        }));
        let events = collect(registry, request()).await;
        let news: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, ScoreEvent::NewsItem { .. }))
            .collect();
        assert_eq!(news.len(), 1);
    }

    #[tokio::test]
    async fn test_pipeline_against_unconnectable_server() {
        let (tx, mut rx) = mpsc::channel(32);
        let config = Arc::new(McpServerConfig::default());
        run_score_pipeline(config, request(), tx).await;

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert!(matches!(events[0], ScoreEvent::Progress { value: 5, .. }));
        assert!(events.iter().any(|e| matches!(
            e,
            ScoreEvent::Error { stage, .. } if stage == "mcp"
        )));
        assert_eq!(events.last(), Some(&ScoreEvent::Done));
    }
}
