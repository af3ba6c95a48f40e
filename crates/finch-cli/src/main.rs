//! finch — gateway, A2A demos, one-shot MCP requests, and workflows

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use finch_a2a::{A2aClient, A2aServer};
use finch_core::FinchConfig;
use finch_gateway::GatewayServer;
use finch_mcp::McpSession;
use finch_workflow::{
    EmotionState, GreetingState, KeywordAnalyzer, build_emotion_graph, build_greeting_graph,
};

#[derive(Parser)]
#[command(name = "finch", version, about = "Market-scoring agent gateway and demos")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,
        /// Port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// A2A echo agent demos
    A2a {
        #[command(subcommand)]
        command: A2aCommand,
    },
    /// One-shot MCP requests against the configured tool server
    Mcp {
        #[command(subcommand)]
        command: McpCommand,
    },
    /// Run a demo workflow and print its final state
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },
}

#[derive(Subcommand)]
enum A2aCommand {
    /// Run the echo agent server
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Send a task to an agent and wait for the reply
    Send {
        /// Task prompt
        text: String,
        /// Agent base URL
        #[arg(long, conflicts_with = "peer")]
        url: Option<String>,
        /// Name of a peer from config instead of a URL
        #[arg(long)]
        peer: Option<String>,
        /// Bearer token, if the agent requires one
        #[arg(long)]
        token: Option<String>,
    },
}

#[derive(Subcommand)]
enum McpCommand {
    /// List the server's tools
    Tools,
    /// Call a named tool
    Call {
        /// Tool name
        name: String,
        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[derive(Subcommand)]
enum WorkflowCommand {
    /// Two-step greeting pipeline
    Greeting {
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Emotion-routing pipeline
    Emotion {
        /// Message to classify and respond to
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { bind, port } => serve_gateway(bind, port).await,
        Command::A2a { command } => match command {
            A2aCommand::Serve { bind, port } => a2a_serve(bind, port).await,
            A2aCommand::Send {
                text,
                url,
                peer,
                token,
            } => a2a_send(&text, url, peer, token).await,
        },
        Command::Mcp { command } => match command {
            McpCommand::Tools => mcp_tools().await,
            McpCommand::Call { name, args } => mcp_call(&name, &args).await,
        },
        Command::Workflow { command } => match command {
            WorkflowCommand::Greeting { name } => workflow_greeting(name).await,
            WorkflowCommand::Emotion { message } => workflow_emotion(message).await,
        },
    }
}

async fn serve_gateway(bind: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = FinchConfig::load()?;
    if let Some(bind) = bind {
        config.gateway.bind = bind;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }
    GatewayServer::new(config).serve().await
}

async fn a2a_serve(bind: String, port: u16) -> Result<()> {
    let base_url = format!("http://{}:{}", bind, port);
    A2aServer::echo(&base_url).serve(&bind, port).await
}

async fn a2a_send(
    text: &str,
    url: Option<String>,
    peer: Option<String>,
    token: Option<String>,
) -> Result<()> {
    // Explicit URL wins; a peer name resolves through config; else localhost
    let (url, token) = match (url, peer) {
        (Some(url), _) => (url, token),
        (None, Some(name)) => {
            let config = FinchConfig::load()?;
            let peer = config
                .peers
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "Unknown peer '{}'. Known peers: {}",
                        name,
                        config
                            .peers
                            .iter()
                            .map(|p| p.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                })?;
            (peer.url.clone(), token.or_else(|| peer.token.clone()))
        }
        (None, None) => ("http://127.0.0.1:8000".to_string(), token),
    };
    let url = url.as_str();
    let token = token.as_deref();

    let client = A2aClient::new();

    let card = client.fetch_agent_card(url, token).await?;
    info!(
        "Agent: {} v{} — skills: {}",
        card.name,
        card.version,
        card.skills
            .iter()
            .map(|s| s.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let task = client
        .submit_and_wait(
            url,
            token,
            text,
            serde_json::json!({}),
            Duration::from_millis(500),
            Duration::from_secs(60),
        )
        .await?;

    println!("status: {}", task.status);
    if let Some(result) = task.result {
        println!("{}", result);
    }
    Ok(())
}

async fn mcp_tools() -> Result<()> {
    let config = FinchConfig::load()?;
    let session = McpSession::new(config.mcp);

    let client = session.get_or_connect().await?;
    let tools = client.list_tools().await?;
    for tool in &tools {
        println!("{:<24} {}", tool.name, tool.description);
    }
    session.shutdown().await;
    Ok(())
}

async fn mcp_call(name: &str, args: &str) -> Result<()> {
    let arguments: serde_json::Value = serde_json::from_str(args)?;

    let config = FinchConfig::load()?;
    let session = McpSession::new(config.mcp);

    let client = session.get_or_connect().await?;
    let result = client.call_tool(name, arguments).await;
    session.shutdown().await;

    println!("{}", result?);
    Ok(())
}

async fn workflow_greeting(name: String) -> Result<()> {
    let graph = build_greeting_graph()?;
    let state = graph
        .invoke(GreetingState {
            name,
            ..Default::default()
        })
        .await?;
    println!("{}", state.processed_message);
    Ok(())
}

async fn workflow_emotion(message: String) -> Result<()> {
    let graph = build_emotion_graph(Arc::new(KeywordAnalyzer))?;
    let state = graph
        .invoke(EmotionState {
            user_message: message,
            ..Default::default()
        })
        .await?;
    println!("emotion:  {}", state.emotion);
    println!("response: {}", state.response);
    Ok(())
}
