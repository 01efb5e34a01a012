use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{RelayError, RelayResult};
use crate::skills::types::TaskDefinition;

/// Literal prefix marking a model reply as an embedded task rather than a
/// user-facing answer. Wire-compatible; do not change.
pub const TASK_SENTINEL: &str = "=>execute-local";

fn fence_re() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?s)```[\w-]*\n?(.*?)```").expect("fence regex"))
}

/// Checks the buffer prefix, never an individual chunk: the sentinel may
/// arrive split across several deltas.
pub fn is_task(buffer_text: &str) -> bool {
    buffer_text.starts_with(TASK_SENTINEL)
}

/// Contents of the first fenced code block, trimmed, regardless of the
/// language tag on the fence.
pub fn extract_code_block(text: &str) -> Option<String> {
    fence_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Parses the finalized buffer into a task definition.
pub fn parse_task(buffer_text: &str) -> RelayResult<TaskDefinition> {
    let block = extract_code_block(buffer_text).ok_or(RelayError::NoCodeBlock)?;
    let task: TaskDefinition =
        serde_json::from_str(&block).map_err(|e| RelayError::MalformedTask(e.to_string()))?;
    validate(&task)?;
    Ok(task)
}

/// The routing decision is a single authoritative flag: only the final step
/// may ask for results back. Divergent definitions are rejected here rather
/// than guessed at during execution.
fn validate(task: &TaskDefinition) -> RelayResult<()> {
    let last = task.procedure.len().saturating_sub(1);
    for (i, step) in task.procedure.iter().enumerate() {
        if step.return_results_to_model && i != last {
            return Err(RelayError::MalformedTask(format!(
                "returnResultsToModel is only valid on the final step, found on '{}'",
                step.step_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASK_JSON: &str = r#"{"taskId":"t1","userMessage":"done","procedure":[{"stepId":"s1","skillName":"readFile","input":{"path":"/tmp/x"},"returnResultsToModel":false}]}"#;

    #[test]
    fn test_sentinel_matches_prefix_only() {
        assert!(is_task("=>execute-local\nrest"));
        assert!(!is_task("answer mentioning =>execute-local later"));
        assert!(!is_task("=>execute"));
    }

    #[test]
    fn test_extracts_json_between_fences() {
        let buffer = format!("=>execute-local\n```json\n  {TASK_JSON}  \n```\ntrailing");
        assert_eq!(extract_code_block(&buffer).unwrap(), TASK_JSON);
    }

    #[test]
    fn test_extraction_independent_of_language_tag() {
        for fence in ["```", "```json", "```JSON-like", "```js"] {
            let buffer = format!("=>execute-local {fence}\n{TASK_JSON}\n```");
            assert_eq!(
                extract_code_block(&buffer).as_deref(),
                Some(TASK_JSON),
                "fence opener {fence}"
            );
        }
    }

    #[test]
    fn test_parse_task_round_trip() {
        let buffer = format!("=>execute-local\n```json\n{TASK_JSON}\n```");
        let task = parse_task(&buffer).unwrap();
        assert_eq!(task.task_id, "t1");
        assert_eq!(task.procedure.len(), 1);
        assert_eq!(task.procedure[0].skill_name, "readFile");
    }

    #[test]
    fn test_missing_code_block_is_reported() {
        assert!(matches!(
            parse_task("=>execute-local but no fences"),
            Err(RelayError::NoCodeBlock)
        ));
    }

    #[test]
    fn test_unparseable_block_is_malformed() {
        assert!(matches!(
            parse_task("=>execute-local\n```json\n{not json}\n```"),
            Err(RelayError::MalformedTask(_))
        ));
    }

    #[test]
    fn test_return_flag_on_non_final_step_rejected() {
        let json = r#"{"taskId":"t1","userMessage":"m","procedure":[
            {"stepId":"s1","skillName":"readFile","input":{},"returnResultsToModel":true},
            {"stepId":"s2","skillName":"readFile","input":{},"returnResultsToModel":false}
        ]}"#;
        let buffer = format!("=>execute-local\n```json\n{json}\n```");
        assert!(matches!(
            parse_task(&buffer),
            Err(RelayError::MalformedTask(_))
        ));
    }

    #[test]
    fn test_return_flag_on_final_step_accepted() {
        let json = r#"{"taskId":"t1","userMessage":"m","procedure":[
            {"stepId":"s1","skillName":"readFile","input":{},"returnResultsToModel":false},
            {"stepId":"s2","skillName":"readFile","input":{},"returnResultsToModel":true}
        ]}"#;
        let buffer = format!("=>execute-local\n```json\n{json}\n```");
        assert!(parse_task(&buffer).is_ok());
    }
}
