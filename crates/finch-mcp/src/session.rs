//! Lazy MCP session — connect on first use, exactly one subprocess

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::client::{McpClient, McpLaunch};
use finch_core::config::McpServerConfig;

/// A lazily-connected handle to the configured MCP server.
///
/// The lock is held across spawn and handshake so concurrent first callers
/// never launch a second subprocess.
pub struct McpSession {
    config: McpServerConfig,
    client: Mutex<Option<Arc<McpClient>>>,
}

impl McpSession {
    pub fn new(config: McpServerConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
        }
    }

    /// Get the connected client, spawning the server on first use
    pub async fn get_or_connect(&self) -> Result<Arc<McpClient>> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let launch = McpLaunch::from_config(&self.config)?;
        let client = McpClient::connect(launch).await?;
        *guard = Some(client.clone());
        Ok(client)
    }

    /// Shut down the subprocess if one is running
    pub async fn shutdown(&self) {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.take() {
            info!("Stopping MCP session for {}", self.config.name);
            client.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_connect_fails_without_server_dir() {
        let session = McpSession::new(McpServerConfig::default());
        let result = session.get_or_connect().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_fails_with_missing_dir() {
        let config = McpServerConfig {
            server_dir: Some(PathBuf::from("/nonexistent/yf")),
            ..Default::default()
        };
        let session = McpSession::new(config);
        assert!(session.get_or_connect().await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_without_client_is_noop() {
        let session = McpSession::new(McpServerConfig::default());
        session.shutdown().await;
    }

    /// Stub MCP server that logs each spawn and answers the handshake
    #[cfg(unix)]
    const COUNTING_STUB: &str = r#"#!/bin/sh
echo spawned >> "$SPAWN_LOG"
while IFS= read -r line; do
  case "$line" in
    *'"method":"initialize"'*)
      printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"stub","version":"0"}}}'
      ;;
  esac
done
"#;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_concurrent_first_use_spawns_once() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("server.py"), "# entry").unwrap();
        let script = dir.path().join("stub.sh");
        std::fs::write(&script, COUNTING_STUB).unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let spawn_log = dir.path().join("spawns");
        let config = McpServerConfig {
            command: Some(script.display().to_string()),
            server_dir: Some(dir.path().to_path_buf()),
            env: vec![(
                "SPAWN_LOG".to_string(),
                spawn_log.display().to_string(),
            )],
            timeout_secs: 5,
            ..Default::default()
        };

        let session = Arc::new(McpSession::new(config));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                session.get_or_connect().await.map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        session.shutdown().await;

        let spawns = std::fs::read_to_string(&spawn_log).unwrap();
        assert_eq!(spawns.lines().count(), 1);
    }
}
