use serde::{Deserialize, Serialize};

/// One normalized delta relayed out of the controlled page's network stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub response_id: String,
    /// Incremental delta, not the cumulative text.
    pub content: String,
    pub status: ChunkStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    Typing,
    Finished,
}

impl ChunkStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, ChunkStatus::Finished)
    }
}

impl std::fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkStatus::Typing => write!(f, "typing"),
            ChunkStatus::Finished => write!(f, "finished"),
        }
    }
}
