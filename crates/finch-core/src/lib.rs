//! finch-core — shared types, tool registry, and configuration
//!
//! Everything the other finch crates agree on lives here: the tool handler
//! seam that MCP tools plug into, and the workspace configuration (gateway
//! bind address, MCP server launcher, known A2A peers).

pub mod config;
pub mod tools;

pub use config::{ConfigError, FinchConfig, GatewayConfig, McpServerConfig, PeerConfig};
pub use tools::{ToolDefinition, ToolExecutor, ToolHandler, ToolRegistry};
