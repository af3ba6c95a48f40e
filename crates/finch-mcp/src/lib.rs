//! MCP (Model Context Protocol) support for finch
//!
//! Client-side only: spawns an external MCP tool server as a subprocess and
//! talks JSON-RPC 2.0 over its stdio. The protocol itself stays small — the
//! finch gateway only needs tools/list and tools/call.

pub mod client;
pub mod protocol;
pub mod session;

pub use client::{McpClient, McpLaunch, RemoteMcpTool};
pub use protocol::{ContentBlock, McpTool, extract_content};
pub use session::McpSession;
