pub mod bridge;
pub mod commands;
pub mod config;
pub mod errors;
pub mod page;
pub mod pipeline;
pub mod skills;

use std::sync::Arc;

use crate::bridge::chunk_bridge::ChunkBridge;
use crate::config::AppConfig;
use crate::page::controlled::{ControlledPage, DocumentRenderer};
use crate::page::session::PageSession;
use crate::pipeline::controller::ConversationController;
use crate::skills::registry::SkillRegistry;

/// Installs tracing and `.env` support, then loads the config. A missing or
/// broken config file falls back to defaults instead of aborting startup.
pub fn init() -> AppConfig {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    match config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config; using defaults");
            AppConfig::default()
        }
    }
}

/// Wires the full pipeline for one controlled page: session, chunk bridge,
/// builtin skill registry and the conversation loop controller.
pub fn connect(
    config: &AppConfig,
    page: Arc<dyn ControlledPage>,
    renderer: Arc<dyn DocumentRenderer>,
) -> ConversationController {
    let session = Arc::new(PageSession::open(page));
    let bridge = Arc::new(ChunkBridge::new());
    let registry = Arc::new(SkillRegistry::builtin(&config.skills, renderer));
    ConversationController::new(session, bridge, registry, config.page.upload_timeout_secs)
}
