use std::sync::Mutex;

use crate::bridge::types::{ChunkStatus, StreamChunk};
use crate::errors::{RelayError, RelayResult};

/// The running buffer for one outstanding request. The remote response id is
/// adopted from the first observed chunk.
#[derive(Debug, Clone)]
pub struct ResponseBuffer {
    pub response_id: Option<String>,
    pub text: String,
    pub status: ChunkStatus,
}

/// Cumulative view handed outward on every chunk.
#[derive(Debug, Clone)]
pub struct BufferSnapshot {
    pub data: String,
    pub status: ChunkStatus,
    pub response_id: String,
}

/// Turns a sequence of deltas for one response into a monotonically growing
/// full-text buffer. At most one buffer is active at a time; a second
/// `begin` while one is active is the concurrent-request error.
pub struct ResponseAssembler {
    buffer: Mutex<Option<ResponseBuffer>>,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(None),
        }
    }

    pub fn begin(&self) -> RelayResult<()> {
        let mut buffer = self.buffer.lock().unwrap();
        if buffer.is_some() {
            return Err(RelayError::ConcurrentRequest);
        }
        *buffer = Some(ResponseBuffer {
            response_id: None,
            text: String::new(),
            status: ChunkStatus::Typing,
        });
        Ok(())
    }

    /// Appends the chunk's delta and returns the cumulative snapshot.
    /// Returns None when no buffer is active (late chunk after release) or
    /// when the chunk belongs to a different response.
    pub fn on_chunk(&self, chunk: &StreamChunk) -> Option<BufferSnapshot> {
        let mut guard = self.buffer.lock().unwrap();
        let buffer = guard.as_mut()?;

        match &buffer.response_id {
            None => buffer.response_id = Some(chunk.response_id.clone()),
            Some(id) if *id != chunk.response_id => {
                tracing::warn!(
                    active = %id,
                    incoming = %chunk.response_id,
                    "ignoring chunk for a different response"
                );
                return None;
            }
            Some(_) => {}
        }

        buffer.text.push_str(&chunk.content);
        buffer.status = chunk.status;

        Some(BufferSnapshot {
            data: buffer.text.clone(),
            status: buffer.status,
            response_id: buffer.response_id.clone().unwrap_or_default(),
        })
    }

    pub fn is_active(&self) -> bool {
        self.buffer.lock().unwrap().is_some()
    }

    pub fn is_final(&self) -> bool {
        self.buffer
            .lock()
            .unwrap()
            .as_ref()
            .map(|b| b.status.is_finished())
            .unwrap_or(false)
    }

    pub fn text(&self) -> Option<String> {
        self.buffer
            .lock()
            .unwrap()
            .as_ref()
            .map(|b| b.text.clone())
    }

    pub fn response_id(&self) -> Option<String> {
        self.buffer
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|b| b.response_id.clone())
    }

    /// Releases the buffer (completion, loop-back round, or cancellation).
    pub fn reset(&self) {
        *self.buffer.lock().unwrap() = None;
    }
}

impl Default for ResponseAssembler {
    fn default() -> Self {
        Self::new()
    }
}
