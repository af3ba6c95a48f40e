//! MCP client — spawns an external MCP server and talks to it over stdio

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::protocol::{
    JsonRpcNotification, JsonRpcRequest, McpTool, PROTOCOL_VERSION, extract_content,
};
use finch_core::config::{ConfigError, McpServerConfig, STRIPPED_ENV_VARS};
use finch_core::tools::ToolHandler;

/// Handshake timeout — npm/uv-based servers can be slow on first run
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Clamp a log preview to at most `max` bytes without splitting a character
fn line_preview(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Resolved launch parameters for an external MCP server
#[derive(Debug, Clone)]
pub struct McpLaunch {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl McpLaunch {
    /// Resolve launcher, arguments, and child environment from config,
    /// running preflight checks first
    pub fn from_config(config: &McpServerConfig) -> Result<Self, ConfigError> {
        config.preflight()?;
        Ok(Self {
            name: config.name.clone(),
            command: config.resolve_command()?,
            args: config.launch_args()?,
            env: config.child_env(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

/// MCP client that communicates with an external MCP server via stdio
pub struct McpClient {
    launch: McpLaunch,
    child: Mutex<Option<Child>>,
    stdin: Mutex<Option<tokio::process::ChildStdin>>,
    reader: Mutex<Option<BufReader<tokio::process::ChildStdout>>>,
    next_id: Mutex<u64>,
}

impl McpClient {
    /// Spawn and connect to an external MCP server
    pub async fn connect(launch: McpLaunch) -> Result<Arc<Self>> {
        info!(
            "Connecting to MCP server: {} ({})",
            launch.name, launch.command
        );

        let mut cmd = Command::new(&launch.command);
        cmd.args(&launch.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        // The launcher manages its own virtualenv
        for var in STRIPPED_ENV_VARS {
            cmd.env_remove(var);
        }
        for (key, value) in &launch.env {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn MCP server: {}", launch.command))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("Failed to capture MCP server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("Failed to capture MCP server stdout"))?;

        // Drain stderr in background so MCP server errors are visible in logs
        if let Some(stderr) = child.stderr.take() {
            let server_name = launch.name.clone();
            tokio::spawn(async move {
                let reader = BufReader::new(stderr);
                let mut lines = reader.lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if !line.trim().is_empty() {
                        warn!("MCP server '{}' stderr: {}", server_name, line);
                    }
                }
            });
        }

        let client = Arc::new(Self {
            launch,
            child: Mutex::new(Some(child)),
            stdin: Mutex::new(Some(stdin)),
            reader: Mutex::new(Some(BufReader::new(stdout))),
            next_id: Mutex::new(1),
        });

        tokio::time::timeout(HANDSHAKE_TIMEOUT, client.initialize())
            .await
            .map_err(|_| {
                anyhow!(
                    "MCP server '{}' initialize timed out after {:?}",
                    client.launch.name,
                    HANDSHAKE_TIMEOUT
                )
            })??;

        Ok(client)
    }

    /// Send initialize handshake
    async fn initialize(&self) -> Result<()> {
        let result = self
            .send_request(
                "initialize",
                serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "finch",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            )
            .await?;

        debug!("MCP initialize response: {:?}", result);

        self.send_notification("notifications/initialized", None)
            .await?;

        info!("MCP client connected to {}", self.launch.name);
        Ok(())
    }

    /// List tools advertised by the server
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let result = self
            .send_request("tools/list", serde_json::json!({}))
            .await?;

        let tools: Vec<McpTool> = serde_json::from_value(
            result
                .get("tools")
                .cloned()
                .unwrap_or(serde_json::json!([])),
        )
        .unwrap_or_default();

        info!(
            "Discovered {} tools from MCP server {}",
            tools.len(),
            self.launch.name
        );
        Ok(tools)
    }

    /// List tools as registry handlers
    pub async fn discover_tools(self: &Arc<Self>) -> Result<Vec<Arc<dyn ToolHandler>>> {
        let tools = self.list_tools().await?;
        let handlers: Vec<Arc<dyn ToolHandler>> = tools
            .into_iter()
            .map(|tool| {
                Arc::new(RemoteMcpTool {
                    name: tool.name,
                    description: tool.description,
                    schema: tool.input_schema,
                    client: self.clone(),
                }) as Arc<dyn ToolHandler>
            })
            .collect();
        Ok(handlers)
    }

    /// Call a tool on the MCP server, collapsing its content to text
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        let result = self
            .send_request(
                "tools/call",
                serde_json::json!({
                    "name": name,
                    "arguments": arguments,
                }),
            )
            .await?;

        Ok(extract_content(&result))
    }

    /// Send a JSON-RPC request and wait for the matching response
    async fn send_request(&self, method: &str, params: Value) -> Result<Value> {
        let id = {
            let mut next = self.next_id.lock().await;
            let id = *next;
            *next += 1;
            id
        };

        let request = JsonRpcRequest::new(id, method, params);
        let request_line = serde_json::to_string(&request)? + "\n";

        {
            let mut stdin_guard = self.stdin.lock().await;
            if let Some(ref mut stdin) = *stdin_guard {
                stdin.write_all(request_line.as_bytes()).await?;
                stdin.flush().await?;
            } else {
                return Err(anyhow!("MCP server stdin not available"));
            }
        }

        let response = tokio::time::timeout(self.launch.timeout, self.read_response(id))
            .await
            .map_err(|_| {
                anyhow!("MCP request timed out after {:?}", self.launch.timeout)
            })??;

        if let Some(error) = response.get("error") {
            let msg = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error");
            return Err(anyhow!("MCP error: {}", msg));
        }

        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Read lines until a response with the expected id arrives
    async fn read_response(&self, expected_id: u64) -> Result<Value> {
        let mut reader_guard = self.reader.lock().await;
        let reader = reader_guard
            .as_mut()
            .ok_or_else(|| anyhow!("MCP server stdout not available"))?;

        loop {
            let mut line = String::new();
            let bytes = reader.read_line(&mut line).await?;
            if bytes == 0 {
                return Err(anyhow!("MCP server closed connection"));
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let msg: Value = serde_json::from_str(line).with_context(|| {
                format!("Invalid JSON from MCP server: {}", line_preview(line, 100))
            })?;

            if let Some(id) = msg.get("id").and_then(|i| i.as_u64()) {
                if id == expected_id {
                    return Ok(msg);
                }
            }

            // Notification or unrelated id — log and keep reading
            debug!("MCP notification: {}", line_preview(line, 200));
        }
    }

    /// Send a JSON-RPC notification (no response expected)
    async fn send_notification(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = JsonRpcNotification::new(method, params);
        let line = serde_json::to_string(&notification)? + "\n";

        let mut stdin_guard = self.stdin.lock().await;
        if let Some(ref mut stdin) = *stdin_guard {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await?;
        }

        Ok(())
    }

    /// Shutdown the MCP server process
    pub async fn shutdown(&self) {
        let _ = self
            .send_notification("notifications/cancelled", None)
            .await;

        let mut child_guard = self.child.lock().await;
        if let Some(ref mut child) = *child_guard {
            let _ = child.kill().await;
        }
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        // Best-effort cleanup — can't await in drop
        if let Ok(mut guard) = self.child.try_lock() {
            if let Some(ref mut child) = *guard {
                let _ = child.start_kill();
            }
        }
    }
}

/// A registry tool handler backed by a remote MCP tool
pub struct RemoteMcpTool {
    name: String,
    description: String,
    schema: Value,
    client: Arc<McpClient>,
}

#[async_trait]
impl ToolHandler for RemoteMcpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, input: Value) -> Result<String> {
        debug!("Executing MCP tool {}", self.name);
        self.client.call_tool(&self.name, input).await
    }
}
