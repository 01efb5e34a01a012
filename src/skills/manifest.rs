use serde_json::json;

use crate::skills::registry::SkillRegistry;

/// Renders the skills manifest uploaded into the conversation so the model
/// knows which local capabilities it may request. The template is embedded
/// at compile time; `%osInfo%` and `%skillsList%` are substituted with JSON.
pub fn render_manifest(registry: &SkillRegistry) -> String {
    let template = include_str!("../../prompts/skills.md");

    let os_info = json!({
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "family": std::env::consts::FAMILY,
        "homedir": dirs::home_dir().map(|p| p.display().to_string()),
        "tmpdir": std::env::temp_dir().display().to_string(),
    });

    let skills: serde_json::Map<String, serde_json::Value> = registry
        .descriptors()
        .into_iter()
        .map(|d| (d.name.clone(), serde_json::to_value(&d).unwrap_or_default()))
        .collect();

    template
        .replace("%osInfo%", &os_info.to_string())
        .replace("%skillsList%", &serde_json::Value::Object(skills).to_string())
}
