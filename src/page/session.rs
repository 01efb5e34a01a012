use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::{RelayError, RelayResult};
use crate::page::controlled::ControlledPage;

/// Wraps the single controlled-page handle together with the active-buffer
/// flag, so the one-request-per-page invariant has an explicit owner instead
/// of free-floating module state.
pub struct PageSession {
    page: Arc<dyn ControlledPage>,
    busy: AtomicBool,
    manifest_uploaded: AtomicBool,
}

impl PageSession {
    pub fn open(page: Arc<dyn ControlledPage>) -> Self {
        tracing::info!(page = %page.id(), "page session opened");
        Self {
            page,
            busy: AtomicBool::new(false),
            manifest_uploaded: AtomicBool::new(false),
        }
    }

    pub fn page(&self) -> &Arc<dyn ControlledPage> {
        &self.page
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Claims the page for one request. A second request while one is active
    /// is rejected, not queued: interleaved buffers would corrupt both
    /// responses.
    pub fn acquire(&self) -> RelayResult<()> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(RelayError::ConcurrentRequest);
        }
        tracing::debug!(page = %self.page.id(), "page session acquired");
        Ok(())
    }

    pub fn release(&self) {
        self.busy.store(false, Ordering::SeqCst);
        tracing::debug!(page = %self.page.id(), "page session released");
    }

    pub fn manifest_uploaded(&self) -> bool {
        self.manifest_uploaded.load(Ordering::SeqCst)
    }

    pub fn set_manifest_uploaded(&self) {
        self.manifest_uploaded.store(true, Ordering::SeqCst);
    }
}
