//! Score stream events — the JSON frames sent over SSE

use axum::response::sse::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event in the scoring stream.
///
/// Serialized with a `type` tag so clients can switch on it:
/// `progress`, `quote`, `news_item`, `error`, `score`, `done`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoreEvent {
    Progress { value: u8, message: String },
    Quote { data: Value },
    NewsItem { data: Value },
    Error { stage: String, message: String },
    Score { signal: String, score: f64, rationale: String },
    Done,
}

impl ScoreEvent {
    pub fn progress(value: u8, message: impl Into<String>) -> Self {
        Self::Progress {
            value,
            message: message.into(),
        }
    }

    pub fn error(stage: &str, message: impl Into<String>) -> Self {
        Self::Error {
            stage: stage.to_string(),
            message: message.into(),
        }
    }

    /// Serialize into an SSE frame. A failed serialization degrades to an
    /// error event rather than a broken frame.
    pub fn into_sse(self) -> Event {
        let json = serde_json::to_string(&self).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","stage":"stream","message":"JSON serialization failed: {}"}}"#,
                e
            )
        });
        Event::default().data(json)
    }
}
