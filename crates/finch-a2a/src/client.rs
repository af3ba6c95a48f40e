//! A2A client — sends tasks to peer agents

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::protocol::*;

/// A2A client for communicating with peer agents
#[derive(Clone)]
pub struct A2aClient {
    http: Client,
}

impl Default for A2aClient {
    fn default() -> Self {
        Self::new()
    }
}

impl A2aClient {
    pub fn new() -> Self {
        Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("failed to build HTTP client"),
        }
    }

    fn task_url(base_url: &str, task_id: &str) -> String {
        format!("{}/a2a/tasks/{}", base_url.trim_end_matches('/'), task_id)
    }

    /// Fetch an agent's capability card
    pub async fn fetch_agent_card(&self, base_url: &str, token: Option<&str>) -> Result<AgentCard> {
        let url = format!("{}/.well-known/agent.json", base_url.trim_end_matches('/'));

        let mut req = self.http.get(&url);
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }

        let card: AgentCard = req
            .send()
            .await
            .with_context(|| format!("Failed to connect to agent at {}", url))?
            .error_for_status()
            .context("Agent card request rejected")?
            .json()
            .await
            .context("Failed to parse agent card")?;

        debug!("Peer card: {} v{}, {} skills", card.name, card.version, card.skills.len());
        Ok(card)
    }

    /// Submit a task to a peer agent
    pub async fn submit_task(
        &self,
        base_url: &str,
        token: Option<&str>,
        prompt: &str,
        context: Value,
    ) -> Result<TaskResponse> {
        let url = format!("{}/a2a/tasks", base_url.trim_end_matches('/'));
        let request = TaskRequest {
            prompt: prompt.to_string(),
            context,
        };

        let mut req = self.http.post(&url).json(&request);
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to submit task to {}", url))?;

        // Keep the body: rejection details live there, not in the status line
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Task rejected: HTTP {} {}", status, body));
        }

        let task: TaskResponse = resp.json().await.context("Failed to parse task response")?;
        debug!("Submitted task {} ({})", task.task_id, task.status);
        Ok(task)
    }

    /// Poll task status
    pub async fn get_task_status(
        &self,
        base_url: &str,
        token: Option<&str>,
        task_id: &str,
    ) -> Result<TaskResponse> {
        let url = Self::task_url(base_url, task_id);

        let mut req = self.http.get(&url);
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }

        req.send()
            .await
            .with_context(|| format!("Failed to poll task {}", task_id))?
            .error_for_status()
            .context("Task status request rejected")?
            .json()
            .await
            .context("Failed to parse task status")
    }

    /// Cancel a task; returns its status afterwards
    pub async fn cancel_task(
        &self,
        base_url: &str,
        token: Option<&str>,
        task_id: &str,
    ) -> Result<TaskResponse> {
        let url = Self::task_url(base_url, task_id);

        let mut req = self.http.delete(&url);
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }

        req.send()
            .await
            .with_context(|| format!("Failed to cancel task {}", task_id))?
            .error_for_status()
            .context("Task cancellation rejected")?
            .json()
            .await
            .context("Failed to parse cancel response")
    }

    /// Submit a task and poll until it reaches a terminal status
    pub async fn submit_and_wait(
        &self,
        base_url: &str,
        token: Option<&str>,
        prompt: &str,
        context: Value,
        poll_interval: std::time::Duration,
        timeout: std::time::Duration,
    ) -> Result<TaskResponse> {
        let task = self.submit_task(base_url, token, prompt, context).await?;
        if task.status.is_terminal() {
            return Ok(task);
        }
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if tokio::time::Instant::now() > deadline {
                return Err(anyhow!(
                    "Task {} timed out after {:?}",
                    task.task_id,
                    timeout
                ));
            }

            tokio::time::sleep(poll_interval).await;

            let status = self.get_task_status(base_url, token, &task.task_id).await?;
            if status.status.is_terminal() {
                return Ok(status);
            }
        }
    }
}
