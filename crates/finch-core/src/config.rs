//! Workspace configuration — gateway bind, MCP server launcher, A2A peers
//!
//! Loaded from `~/.finch/config.toml` when present, with environment
//! variables taking precedence for the MCP launcher fields.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Environment variable overriding the MCP launcher command
pub const ENV_MCP_CMD: &str = "FINCH_MCP_CMD";
/// Environment variable overriding the MCP server directory
pub const ENV_MCP_DIR: &str = "FINCH_MCP_DIR";
/// Environment variable overriding the per-call timeout (seconds)
pub const ENV_MCP_TIMEOUT: &str = "FINCH_MCP_TIMEOUT";

/// Variables stripped from the child environment so the launcher's own
/// virtualenv handling is not confused by the parent's
pub const STRIPPED_ENV_VARS: &[&str] = &["VIRTUAL_ENV", "CONDA_DEFAULT_ENV"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file {0}")]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("Cannot find '{0}' launcher. Set FINCH_MCP_CMD or add it to PATH")]
    LauncherNotFound(String),
    #[error("MCP server directory not found: {0}")]
    ServerDirMissing(PathBuf),
    #[error("MCP server entry not found at: {0}")]
    EntryMissing(PathBuf),
    #[error("No MCP server directory configured. Set FINCH_MCP_DIR or [mcp].server_dir")]
    ServerDirUnset,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinchConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub mcp: McpServerConfig,
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
}

/// HTTP gateway bind settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// How to launch the external MCP tool server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Display name used in logs and tool prefixes
    #[serde(default = "default_mcp_name")]
    pub name: String,
    /// Launcher command; resolved via PATH lookup of `uv` when unset
    #[serde(default)]
    pub command: Option<String>,
    /// Directory containing the server entry script
    #[serde(default)]
    pub server_dir: Option<PathBuf>,
    /// Entry script run by the launcher inside `server_dir`
    #[serde(default = "default_entry")]
    pub entry: String,
    /// Extra launcher arguments appended after the entry script
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the child process
    #[serde(default)]
    pub env: Vec<(String, String)>,
    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_mcp_name() -> String {
    "yfinance".to_string()
}
fn default_entry() -> String {
    "server.py".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            name: default_mcp_name(),
            command: None,
            server_dir: None,
            entry: default_entry(),
            args: Vec::new(),
            env: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// A known A2A peer agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl FinchConfig {
    /// Default config file path: `~/.finch/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".finch").join("config.toml"))
    }

    /// Load from the default path, falling back to defaults when the file
    /// does not exist. Environment overrides are applied afterwards.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => {
                let mut config = Self::default();
                config.apply_env_overrides();
                Ok(config)
            }
        }
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let mut config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.apply_env_overrides();
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `FINCH_MCP_*` environment overrides on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(cmd) = std::env::var(ENV_MCP_CMD) {
            if !cmd.is_empty() {
                self.mcp.command = Some(cmd);
            }
        }
        if let Ok(dir) = std::env::var(ENV_MCP_DIR) {
            if !dir.is_empty() {
                self.mcp.server_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(secs) = std::env::var(ENV_MCP_TIMEOUT) {
            if let Ok(secs) = secs.parse::<u64>() {
                self.mcp.timeout_secs = secs;
            }
        }
    }
}

impl McpServerConfig {
    /// Resolve the launcher command: explicit value first, then `uv` on PATH
    pub fn resolve_command(&self) -> Result<String, ConfigError> {
        if let Some(cmd) = &self.command {
            return Ok(cmd.clone());
        }
        which::which("uv")
            .map(|p| p.to_string_lossy().into_owned())
            .map_err(|_| ConfigError::LauncherNotFound("uv".to_string()))
    }

    /// Arguments passed to the launcher: `--directory <dir> run <entry>`
    /// plus any configured extras
    pub fn launch_args(&self) -> Result<Vec<String>, ConfigError> {
        let dir = self
            .server_dir
            .as_ref()
            .ok_or(ConfigError::ServerDirUnset)?;
        let mut args = vec![
            "--directory".to_string(),
            dir.to_string_lossy().into_owned(),
            "run".to_string(),
            self.entry.clone(),
        ];
        args.extend(self.args.iter().cloned());
        Ok(args)
    }

    /// Verify the server directory and entry script exist before spawning
    pub fn preflight(&self) -> Result<(), ConfigError> {
        let dir = self
            .server_dir
            .as_ref()
            .ok_or(ConfigError::ServerDirUnset)?;
        if !dir.is_dir() {
            return Err(ConfigError::ServerDirMissing(dir.clone()));
        }
        let entry = dir.join(&self.entry);
        if !entry.is_file() {
            return Err(ConfigError::EntryMissing(entry));
        }
        info!(
            "MCP preflight passed: dir={} entry={}",
            dir.display(),
            self.entry
        );
        Ok(())
    }

    /// Environment additions for the child process. Unbuffered output keeps
    /// the stdio framing timely.
    pub fn child_env(&self) -> Vec<(String, String)> {
        let mut env = vec![("PYTHONUNBUFFERED".to_string(), "1".to_string())];
        env.extend(self.env.iter().cloned());
        env
    }
}
