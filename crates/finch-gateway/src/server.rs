//! Gateway HTTP server powered by axum
//!
//! Serves:
//! - `GET  /health`    — liveness check
//! - `GET  /mcp/tools` — tool listing from a fresh MCP session
//! - `POST /score`     — scoring pipeline streamed as server-sent events

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::sse::{Event, Sse},
    routing::{get, post},
};
use futures_util::Stream;
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::score::{ScoreRequest, run_score_pipeline};
use finch_core::config::{FinchConfig, McpServerConfig};
use finch_mcp::client::{McpClient, McpLaunch};

/// Buffered events between the pipeline task and the SSE writer
const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Shared state for the gateway
#[derive(Clone)]
pub struct GatewayState {
    mcp: Arc<McpServerConfig>,
}

/// The gateway server
pub struct GatewayServer {
    config: FinchConfig,
}

impl GatewayServer {
    pub fn new(config: FinchConfig) -> Self {
        Self { config }
    }

    /// Build the axum router
    pub fn router(&self) -> Router {
        let state = GatewayState {
            mcp: Arc::new(self.config.mcp.clone()),
        };
        Router::new()
            .route("/health", get(health))
            .route("/mcp/tools", get(mcp_tools))
            .route("/score", post(score))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind and serve until shutdown
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr: SocketAddr = format!(
            "{}:{}",
            self.config.gateway.bind, self.config.gateway.port
        )
        .parse()?;
        let app = self.router();

        info!("Gateway starting on http://{}", addr);
        info!("  health:   http://{}/health", addr);
        info!("  tools:    http://{}/mcp/tools", addr);
        info!("  scoring:  POST http://{}/score", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// List the MCP server's tools as `{ name: { "description": ... } }`
async fn mcp_tools(
    State(state): State<GatewayState>,
) -> Result<Json<Value>, (StatusCode, Json<ErrorBody>)> {
    let client = connect(&state.mcp).await.map_err(|e| {
        warn!("MCP connection failed: {}", e);
        (
            StatusCode::BAD_GATEWAY,
            Json(ErrorBody {
                error: e.to_string(),
            }),
        )
    })?;

    let result = client.list_tools().await;
    client.shutdown().await;

    let tools = result.map_err(|e| {
        (
            StatusCode::BAD_GATEWAY,
            Json(ErrorBody {
                error: e.to_string(),
            }),
        )
    })?;

    let map: serde_json::Map<String, Value> = tools
        .into_iter()
        .map(|t| {
            (
                t.name,
                serde_json::json!({ "description": t.description }),
            )
        })
        .collect();
    Ok(Json(Value::Object(map)))
}

async fn connect(config: &McpServerConfig) -> anyhow::Result<Arc<McpClient>> {
    let launch = McpLaunch::from_config(config)?;
    McpClient::connect(launch).await
}

/// Stream the scoring pipeline as SSE
async fn score(
    State(state): State<GatewayState>,
    Json(request): Json<ScoreRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<ErrorBody>)> {
    if let Err(message) = request.validate() {
        return Err((StatusCode::BAD_REQUEST, Json(ErrorBody { error: message })));
    }

    info!(
        "Scoring request: ticker={} market={} lookback={}d",
        request.ticker, request.market, request.lookback_days
    );

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(run_score_pipeline(state.mcp.clone(), request, tx));

    let stream = ReceiverStream::new(rx).map(|ev| Ok(ev.into_sse()));
    Ok(Sse::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_server() -> GatewayServer {
        // Default config has no MCP server dir, so MCP-backed routes fail fast
        GatewayServer::new(FinchConfig::default())
    }

    async fn body_string(resp: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8 body")
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_server().router();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .expect("request");

        let resp = app.oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_string(resp).await;
        assert_eq!(body, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_mcp_tools_unreachable_server() {
        let app = test_server().router();
        let req = Request::builder()
            .uri("/mcp/tools")
            .body(Body::empty())
            .expect("request");

        let resp = app.oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body = body_string(resp).await;
        assert!(body.contains("error"));
    }

    #[tokio::test]
    async fn test_score_rejects_bad_lookback() {
        let app = test_server().router();
        let body = serde_json::json!({"ticker": "AAPL", "lookbackDays": 99});
        let req = Request::builder()
            .method("POST")
            .uri("/score")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");

        let resp = app.oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_string(resp).await;
        assert!(body.contains("lookbackDays"));
    }

    #[tokio::test]
    async fn test_score_streams_error_and_done() {
        let app = test_server().router();
        let body = serde_json::json!({"ticker": "AAPL"});
        let req = Request::builder()
            .method("POST")
            .uri("/score")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");

        let resp = app.oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("text/event-stream"));

        // The pipeline fails to connect (no server dir), so the stream ends
        // quickly with an error event and a done event.
        let body = body_string(resp).await;
        assert!(body.contains(r#""type":"progress""#));
        assert!(body.contains(r#""type":"error""#));
        assert!(body.contains(r#""type":"done""#));
        // SSE framing: every event is a data: line
        assert!(body.contains("data: {"));
    }
}
