use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{RelayError, RelayResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub page: PageConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    /// Origin of the conversational web UI the controlled page is on.
    pub base_url: String,
    /// Substring of the completion endpoint whose responses carry the
    /// answer stream; collaborators use it to decide which responses to
    /// retag for interception.
    pub completion_endpoint: String,
    /// Bounded wait for in-page side effects such as file uploads.
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            base_url: "https://chat.qwen.ai".into(),
            completion_endpoint: "/chat/completions".into(),
            upload_timeout_secs: default_upload_timeout(),
        }
    }
}

fn default_upload_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsConfig {
    /// When false, runTerminalCommand is left out of the registry.
    #[serde(default = "default_true")]
    pub allow_terminal_commands: bool,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            allow_terminal_commands: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn resolve_config_path() -> RelayResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("pagerelay").join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config directory");
            return Ok(candidate);
        }
    }

    Err(RelayError::Config(
        "config.toml not found next to executable, in working directory, or in user config directory".into(),
    ))
}

pub fn load_config() -> RelayResult<AppConfig> {
    let path = resolve_config_path()?;
    let content = std::fs::read_to_string(&path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), base_url = %config.page.base_url, "config loaded");
    Ok(config)
}

pub fn save_config(config: &AppConfig) -> RelayResult<()> {
    let path = resolve_config_path()?;
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
