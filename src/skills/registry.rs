use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::config::SkillsConfig;
use crate::page::controlled::DocumentRenderer;
use crate::skills::builtin::{HtmlDocumentToPdf, ReadFile, RunTerminalCommand, WriteFile};
use crate::skills::types::Skill;

/// Metadata row surfaced to the model via the skills manifest.
#[derive(Debug, Clone, Serialize)]
pub struct SkillDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Registry of all locally invocable skills, keyed by wire name.
/// Built once at startup and read-only afterwards.
pub struct SkillRegistry {
    skills: HashMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self {
            skills: HashMap::new(),
        }
    }

    pub fn register(&mut self, skill: Arc<dyn Skill>) {
        self.skills.insert(skill.name().to_string(), skill);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Skill>> {
        self.skills.get(name).cloned()
    }

    pub fn list_names(&self) -> Vec<String> {
        self.skills.keys().cloned().collect()
    }

    pub fn descriptors(&self) -> Vec<SkillDescriptor> {
        let mut rows: Vec<SkillDescriptor> = self
            .skills
            .values()
            .map(|s| SkillDescriptor {
                name: s.name().to_string(),
                description: s.description().to_string(),
                parameters: s.parameters(),
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    /// Builds the default registry from the loaded config. The terminal
    /// command skill is only registered when the config allows it.
    pub fn builtin(config: &SkillsConfig, renderer: Arc<dyn DocumentRenderer>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ReadFile));
        registry.register(Arc::new(WriteFile));
        if config.allow_terminal_commands {
            registry.register(Arc::new(RunTerminalCommand));
        } else {
            tracing::warn!("terminal commands disabled by config, runTerminalCommand not registered");
        }
        registry.register(Arc::new(HtmlDocumentToPdf::new(renderer)));
        tracing::info!(skills = ?registry.list_names(), "skill registry built");
        registry
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}
