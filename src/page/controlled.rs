use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::bridge::chunk_bridge::ChunkBridge;
use crate::errors::RelayResult;

/// A file handed to the controlled page's upload surface.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn markdown(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime: "text/markdown".into(),
            bytes: content.into().into_bytes(),
        }
    }
}

/// The externally managed browser tab this pipeline observes and drives.
///
/// Implementations own the automation transport (CDP session, extension
/// messaging, ...); this crate only sees the operations below.
#[async_trait]
pub trait ControlledPage: Send + Sync {
    /// Stable identity of the underlying page, used to de-duplicate
    /// instrumentation.
    fn id(&self) -> String;

    /// Delivers text into the remote chat input surface and triggers a send.
    async fn submit_text(&self, text: &str) -> RelayResult<()>;

    /// Installs the network hook that forwards captured stream frames to
    /// `bridge.ingest_frame`. Called at most once per page identity; the
    /// [`ChunkBridge`] guards the de-duplication.
    async fn attach_interception(&self, bridge: Arc<ChunkBridge>) -> RelayResult<()>;

    /// Delivers files into the conversation. Resolves once the page reports
    /// the upload complete; callers bound the wait with a timeout.
    async fn upload_files(&self, files: &[UploadFile]) -> RelayResult<()>;
}

/// Prints a document to PDF through the browser collaborator.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Renders `url` (http(s) or file://) and writes the PDF to `output`.
    /// Returns the path actually written.
    async fn render_pdf(&self, url: &str, output: &Path) -> RelayResult<PathBuf>;
}
