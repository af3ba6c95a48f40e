//! MCP JSON-RPC protocol types
//!
//! Implements the client side of the Model Context Protocol over JSON-RPC 2.0.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version sent in the initialize handshake
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC notification (no id, no response expected)
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        }
    }
}

/// MCP tool definition (from tools/list)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// One block in a tools/call result's content array.
///
/// Server versions have shipped `text`, `data`, and `json` payload fields
/// under the same content shape. Typed variants cover all three; anything
/// else falls through to the raw value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContentBlock {
    Text { text: String },
    Data { data: Value },
    Json { json: Value },
    Other(Value),
}

impl ContentBlock {
    /// Render the block as display text
    pub fn into_text(self) -> String {
        match self {
            Self::Text { text } => text,
            Self::Data { data } => data.to_string(),
            Self::Json { json } => json.to_string(),
            Self::Other(value) => value.to_string(),
        }
    }
}

/// Collapse a tools/call result into display text.
///
/// Prefers the content array, then `structuredContent`, then the raw result
/// pretty-printed.
pub fn extract_content(result: &Value) -> String {
    if let Some(content) = result.get("content").and_then(|c| c.as_array()) {
        if !content.is_empty() {
            let blocks: Vec<String> = content
                .iter()
                .cloned()
                .map(|block| {
                    serde_json::from_value::<ContentBlock>(block.clone())
                        .map(ContentBlock::into_text)
                        .unwrap_or_else(|_| block.to_string())
                })
                .collect();
            return blocks.join("\n");
        }
    }
    if let Some(structured) = result.get("structuredContent") {
        return structured.to_string();
    }
    serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string())
}
