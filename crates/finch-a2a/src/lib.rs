//! A2A (Agent-to-Agent) protocol support for finch
//!
//! Provides both server (receive tasks from peers) and client (send tasks to
//! peers). The bundled executor is the echo agent: it answers every prompt
//! with "pong", which is all the protocol plumbing needs to be exercised
//! end to end.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::A2aClient;
pub use protocol::{AgentCard, AgentSkill, AuthConfig, TaskRequest, TaskResponse, TaskStatus};
pub use server::{A2aServer, AgentExecutor, EchoExecutor};
