use crate::bridge::types::{ChunkStatus, StreamChunk};

/// Parses one raw network frame captured inside the controlled page.
///
/// A frame may carry several `data:`-delimited JSON records. Records without
/// a choice list are discarded; for each choice only deltas with
/// `phase == "answer"` are forwarded. Malformed records are logged and
/// skipped so a single bad frame never aborts the stream.
pub fn parse_frame(raw: &str) -> Vec<StreamChunk> {
    let mut chunks = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let data = match line.strip_prefix("data:") {
            Some(d) => d.trim(),
            None => continue,
        };

        if data.is_empty() || data == "[DONE]" {
            continue;
        }

        let record: serde_json::Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed stream record");
                continue;
            }
        };

        let Some(choices) = record["choices"].as_array() else {
            continue;
        };

        let response_id = record["response_id"].as_str().unwrap_or("").to_string();

        for choice in choices {
            let delta = &choice["delta"];
            if delta["phase"].as_str() != Some("answer") {
                continue;
            }

            let status = match delta["status"].as_str() {
                Some("finished") => ChunkStatus::Finished,
                _ => ChunkStatus::Typing,
            };

            chunks.push(StreamChunk {
                response_id: response_id.clone(),
                content: delta["content"].as_str().unwrap_or("").to_string(),
                status,
            });
        }
    }

    chunks
}
