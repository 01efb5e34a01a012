use serde::{Deserialize, Serialize};

use crate::bridge::types::ChunkStatus;

/// Lifecycle states of one user-initiated exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Sending,
    Streaming,
    Executing { task_id: String },
    Finalized,
}

/// Event pushed to the caller's stream. `Chunk.data` is always the
/// cumulative buffer, never a delta, so a client can render the latest
/// state without diffing.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseEvent {
    Chunk {
        data: String,
        status: ChunkStatus,
        #[serde(rename = "responseId")]
        response_id: String,
    },
    Error {
        message: String,
    },
}

/// Inbound payload starting one conversation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMessage {
    pub message: String,
    #[serde(default)]
    pub mode: Option<SubmitMode>,
    #[serde(default = "chrono::Utc::now")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub tab_id: Option<String>,
}

impl SubmitMessage {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            mode: None,
            timestamp: chrono::Utc::now(),
            tab_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitMode {
    Agent,
    Assistant,
}
