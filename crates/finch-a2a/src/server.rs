//! A2A server powered by axum
//!
//! Serves:
//! - `GET    /.well-known/agent.json` — agent card discovery
//! - `POST   /a2a/tasks`              — submit a task
//! - `GET    /a2a/tasks/{id}`         — poll task status
//! - `DELETE /a2a/tasks/{id}`         — cancel a task
//! - `GET    /a2a/health`             — health check

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::protocol::*;

/// Executes submitted tasks
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, prompt: &str, context: &Value) -> Result<String>;
}

/// The demo executor: replies "pong" to everything
pub struct EchoExecutor;

#[async_trait]
impl AgentExecutor for EchoExecutor {
    async fn execute(&self, _prompt: &str, _context: &Value) -> Result<String> {
        Ok("pong".to_string())
    }
}

type TaskStore = Arc<RwLock<HashMap<String, TaskResponse>>>;

/// Clamp a log preview to at most `max` bytes without splitting a character
fn prompt_preview(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Shared state for the A2A server
#[derive(Clone)]
pub struct A2aState {
    card: Arc<AgentCard>,
    executor: Arc<dyn AgentExecutor>,
    tasks: TaskStore,
}

/// A2A server wrapping an executor behind the task lifecycle
pub struct A2aServer {
    state: A2aState,
}

impl A2aServer {
    pub fn new(card: AgentCard, executor: Arc<dyn AgentExecutor>) -> Self {
        Self {
            state: A2aState {
                card: Arc::new(card),
                executor,
                tasks: Arc::new(RwLock::new(HashMap::new())),
            },
        }
    }

    /// The echo agent: one `echo` skill, replies "pong"
    pub fn echo(base_url: &str) -> Self {
        let card = AgentCard {
            name: "finch-echo".to_string(),
            description: "Minimal A2A echo agent that replies 'pong'".to_string(),
            url: base_url.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: vec!["text".to_string()],
            skills: vec![AgentSkill {
                id: "echo".to_string(),
                name: "Echo".to_string(),
                description: "Return 'pong'".to_string(),
                tags: vec!["echo".to_string()],
            }],
            authentication: AuthConfig::default(),
        };
        Self::new(card, Arc::new(EchoExecutor))
    }

    /// Build the axum router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/.well-known/agent.json", get(get_agent_card))
            .route("/a2a/tasks", post(submit_task))
            .route("/a2a/tasks/{task_id}", get(get_task))
            .route("/a2a/tasks/{task_id}", delete(cancel_task))
            .route("/a2a/health", get(health))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind and serve until shutdown
    pub async fn serve(self, bind: &str, port: u16) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
        let app = self.router();

        info!("A2A server starting on http://{}", addr);
        info!("  agent card: http://{}/.well-known/agent.json", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn get_agent_card(State(state): State<A2aState>) -> Json<AgentCard> {
    Json((*state.card).clone())
}

async fn health(State(state): State<A2aState>) -> Json<Value> {
    Json(serde_json::json!({
        "ok": true,
        "agent": state.card.name,
        "version": state.card.version,
    }))
}

async fn submit_task(
    State(state): State<A2aState>,
    Json(request): Json<TaskRequest>,
) -> (StatusCode, Json<TaskResponse>) {
    let task = TaskResponse {
        task_id: Uuid::new_v4().to_string(),
        status: TaskStatus::Submitted,
        result: None,
        created_at: Utc::now(),
        completed_at: None,
    };

    state
        .tasks
        .write()
        .await
        .insert(task.task_id.clone(), task.clone());

    info!(
        "Task {} submitted: {}",
        task.task_id,
        prompt_preview(&request.prompt, 80)
    );

    let task_id = task.task_id.clone();
    let worker_state = state.clone();
    tokio::spawn(async move {
        run_task(worker_state, task_id, request).await;
    });

    (StatusCode::CREATED, Json(task))
}

/// Drive a task through working → completed/failed, respecting cancellation
async fn run_task(state: A2aState, task_id: String, request: TaskRequest) {
    {
        let mut tasks = state.tasks.write().await;
        match tasks.get_mut(&task_id) {
            Some(task) if !task.status.is_terminal() => task.status = TaskStatus::Working,
            _ => return,
        }
    }

    let outcome = state
        .executor
        .execute(&request.prompt, &request.context)
        .await;

    let mut tasks = state.tasks.write().await;
    let Some(task) = tasks.get_mut(&task_id) else {
        return;
    };
    // A cancel that raced the executor wins
    if task.status.is_terminal() {
        return;
    }
    match outcome {
        Ok(result) => {
            task.status = TaskStatus::Completed;
            task.result = Some(result);
        }
        Err(e) => {
            warn!("Task {} failed: {}", task_id, e);
            task.status = TaskStatus::Failed;
            task.result = Some(e.to_string());
        }
    }
    task.completed_at = Some(Utc::now());
}

async fn get_task(
    State(state): State<A2aState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskResponse>, (StatusCode, Json<ErrorResponse>)> {
    let tasks = state.tasks.read().await;
    match tasks.get(&task_id) {
        Some(task) => Ok(Json(task.clone())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Unknown task: {}", task_id),
            }),
        )),
    }
}

async fn cancel_task(
    State(state): State<A2aState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut tasks = state.tasks.write().await;
    match tasks.get_mut(&task_id) {
        Some(task) => {
            if !task.status.is_terminal() {
                task.status = TaskStatus::Cancelled;
                task.completed_at = Some(Utc::now());
                info!("Task {} cancelled", task_id);
            }
            Ok(Json(task.clone()))
        }
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Unknown task: {}", task_id),
            }),
        )),
    }
}
