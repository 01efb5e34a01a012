use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::bridge::frame_parser::parse_frame;
use crate::bridge::types::StreamChunk;
use crate::errors::RelayResult;
use crate::page::controlled::ControlledPage;

/// Handle returned by [`ChunkBridge::subscribe`]; passing it back to
/// [`ChunkBridge::unsubscribe`] removes exactly that listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(Uuid);

/// Relays raw network frames captured inside a controlled page to
/// process-level listeners as normalized [`StreamChunk`] events.
///
/// One bridge serves one physical page; instrumentation is installed at most
/// once per page identity, so repeated `attach` calls are no-ops.
pub struct ChunkBridge {
    listeners: Mutex<HashMap<ListenerToken, mpsc::UnboundedSender<StreamChunk>>>,
    instrumented: Mutex<HashSet<String>>,
}

impl ChunkBridge {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            instrumented: Mutex::new(HashSet::new()),
        }
    }

    /// Installs the network interception hook on `page`, exactly once per
    /// page identity.
    pub async fn attach(self: &Arc<Self>, page: &Arc<dyn ControlledPage>) -> RelayResult<()> {
        let page_id = page.id();
        {
            let instrumented = self.instrumented.lock().unwrap();
            if instrumented.contains(&page_id) {
                tracing::debug!(page = %page_id, "page already instrumented, skipping");
                return Ok(());
            }
        }

        page.attach_interception(Arc::clone(self)).await?;
        self.instrumented.lock().unwrap().insert(page_id.clone());
        tracing::info!(page = %page_id, "network interception attached");
        Ok(())
    }

    /// Registers a listener; the returned receiver yields every chunk
    /// published after this call.
    pub fn subscribe(&self) -> (ListenerToken, mpsc::UnboundedReceiver<StreamChunk>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = ListenerToken(Uuid::new_v4());
        self.listeners.lock().unwrap().insert(token, tx);
        tracing::debug!(?token, "chunk listener subscribed");
        (token, rx)
    }

    /// Removes one listener. Must be called when the owning request
    /// completes or the caller disconnects, so chunks cannot leak into the
    /// next request's buffer.
    pub fn unsubscribe(&self, token: ListenerToken) {
        if self.listeners.lock().unwrap().remove(&token).is_some() {
            tracing::debug!(?token, "chunk listener unsubscribed");
        }
    }

    /// Entry point for the page collaborator: parses a raw frame and fans
    /// the resulting chunks out to all registered listeners.
    pub fn ingest_frame(&self, raw: &str) {
        for chunk in parse_frame(raw) {
            self.publish(chunk);
        }
    }

    fn publish(&self, chunk: StreamChunk) {
        let mut listeners = self.listeners.lock().unwrap();
        // Listeners whose receiver is gone are pruned here.
        listeners.retain(|token, tx| {
            if tx.send(chunk.clone()).is_err() {
                tracing::debug!(?token, "dropping dead chunk listener");
                false
            } else {
                true
            }
        });
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

impl Default for ChunkBridge {
    fn default() -> Self {
        Self::new()
    }
}
