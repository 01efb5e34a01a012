use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::skills::registry::SkillRegistry;
use crate::skills::types::{ProcedureStep, StepInput, StepOutput, TaskDefinition};

/// Aggregated result of one task run: the per-step output store plus the
/// routing decision taken from the last step that actually executed.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub outputs: BTreeMap<String, StepOutput>,
    pub return_to_model: bool,
}

/// Runs a task's steps against the registry, in declared order.
///
/// An unknown skill aborts the remaining procedure and forces the routing
/// decision back to the model; any other failure is recorded under the
/// step's id and the procedure continues. Nothing escapes this boundary.
pub async fn run_task(registry: &SkillRegistry, task: &TaskDefinition) -> TaskOutcome {
    let mut outputs: BTreeMap<String, StepOutput> = BTreeMap::new();
    let mut return_to_model = false;

    for step in &task.procedure {
        let Some(skill) = registry.lookup(&step.skill_name) else {
            tracing::error!(
                task = %task.task_id,
                step = %step.step_id,
                skill = %step.skill_name,
                "skill not found, aborting procedure"
            );
            outputs.insert(
                step.step_id.clone(),
                StepOutput::failure(format!("Skill {} not found", step.skill_name)),
            );
            return_to_model = true;
            break;
        };

        let result = match resolve_inputs(step, &outputs) {
            Ok(params) => {
                // Exactly one invocation per step, with the fully resolved map.
                let result = skill.invoke(&params).await;
                tracing::info!(
                    task = %task.task_id,
                    step = %step.step_id,
                    skill = %step.skill_name,
                    ok = result.ok,
                    "step executed"
                );
                result
            }
            Err(message) => {
                tracing::warn!(
                    task = %task.task_id,
                    step = %step.step_id,
                    error = %message,
                    "step input resolution failed"
                );
                StepOutput::failure(message)
            }
        };

        outputs.insert(step.step_id.clone(), result);
        return_to_model = step.return_results_to_model;
    }

    TaskOutcome {
        outputs,
        return_to_model,
    }
}

/// Builds the parameter map for one step. Literals pass through verbatim;
/// `fromStep` references substitute the `.data` of the referenced output.
/// A reference to a step that has not run (forward or self reference) fails
/// the whole step.
fn resolve_inputs(
    step: &ProcedureStep,
    outputs: &BTreeMap<String, StepOutput>,
) -> Result<Map<String, Value>, String> {
    let mut params = Map::new();
    for (key, input) in &step.input {
        match input {
            StepInput::Literal(value) => {
                params.insert(key.clone(), value.clone());
            }
            StepInput::FromStep { from_step } => {
                let Some(prev) = outputs.get(from_step) else {
                    return Err(format!(
                        "input '{key}' references step '{from_step}' which has not executed"
                    ));
                };
                params.insert(key.clone(), prev.data.clone());
            }
        }
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::skills::types::Skill;

    /// Records every parameter map it is invoked with.
    struct EchoSkill {
        name: &'static str,
        calls: std::sync::Mutex<Vec<Map<String, Value>>>,
    }

    impl EchoSkill {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: std::sync::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Skill for EchoSkill {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "echoes its parameters"
        }
        fn parameters(&self) -> Value {
            json!({})
        }
        async fn invoke(&self, params: &Map<String, Value>) -> StepOutput {
            self.calls.lock().unwrap().push(params.clone());
            StepOutput::success(Value::Object(params.clone()))
        }
    }

    struct FailingSkill;

    #[async_trait]
    impl Skill for FailingSkill {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn parameters(&self) -> Value {
            json!({})
        }
        async fn invoke(&self, _params: &Map<String, Value>) -> StepOutput {
            StepOutput::failure("boom")
        }
    }

    fn step(id: &str, skill: &str, input: &[(&str, StepInput)], last: bool) -> ProcedureStep {
        ProcedureStep {
            step_id: id.into(),
            skill_name: skill.into(),
            input: input
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            return_results_to_model: last,
        }
    }

    fn task(procedure: Vec<ProcedureStep>) -> TaskDefinition {
        TaskDefinition {
            task_id: "t1".into(),
            user_message: "done".into(),
            procedure,
        }
    }

    fn literal(v: Value) -> StepInput {
        StepInput::Literal(v)
    }

    fn from_step(id: &str) -> StepInput {
        StepInput::FromStep {
            from_step: id.into(),
        }
    }

    #[tokio::test]
    async fn test_missing_skill_fails_fast() {
        let mut registry = SkillRegistry::new();
        registry.register(EchoSkill::new("echo"));

        // First step names a skill that is not registered; the second must
        // never run and must not appear in the output store.
        let outcome = run_task(
            &registry,
            &task(vec![
                step("a", "writeFile", &[("path", literal(json!("/tmp/x")))], false),
                step("b", "echo", &[("path", from_step("a"))], false),
            ]),
        )
        .await;

        assert_eq!(outcome.outputs.len(), 1);
        assert!(!outcome.outputs["a"].ok);
        assert_eq!(outcome.outputs["a"].data, json!("Skill writeFile not found"));
        assert!(!outcome.outputs.contains_key("b"));
        assert!(outcome.return_to_model);
    }

    #[tokio::test]
    async fn test_from_step_substitutes_prior_output() {
        let echo = EchoSkill::new("echo");
        let mut registry = SkillRegistry::new();
        registry.register(echo.clone());

        let outcome = run_task(
            &registry,
            &task(vec![
                step("a", "echo", &[("value", literal(json!("seed")))], false),
                step("b", "echo", &[("carried", from_step("a"))], true),
            ]),
        )
        .await;

        assert!(outcome.outputs["b"].ok);
        assert!(outcome.return_to_model);

        let calls = echo.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        // Step b received step a's whole recorded data.
        assert_eq!(calls[1]["carried"], json!({ "value": "seed" }));
    }

    #[tokio::test]
    async fn test_skill_failure_does_not_abort_procedure() {
        let echo = EchoSkill::new("echo");
        let mut registry = SkillRegistry::new();
        registry.register(echo.clone());
        registry.register(Arc::new(FailingSkill));

        let outcome = run_task(
            &registry,
            &task(vec![
                step("a", "failing", &[], true),
                step("b", "echo", &[], false),
            ]),
        )
        .await;

        assert!(!outcome.outputs["a"].ok);
        assert!(outcome.outputs["b"].ok);
        // Routing comes from the last executed step, not the failed one.
        assert!(!outcome.return_to_model);
    }

    #[tokio::test]
    async fn test_forward_reference_fails_the_step_only() {
        let echo = EchoSkill::new("echo");
        let mut registry = SkillRegistry::new();
        registry.register(echo.clone());

        let outcome = run_task(
            &registry,
            &task(vec![
                step("a", "echo", &[("v", from_step("b"))], false),
                step("b", "echo", &[], false),
            ]),
        )
        .await;

        assert!(!outcome.outputs["a"].ok);
        assert!(outcome.outputs["b"].ok);
        // The forward-referencing step never reached its skill.
        assert_eq!(echo.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_single_invocation_per_step() {
        let echo = EchoSkill::new("echo");
        let mut registry = SkillRegistry::new();
        registry.register(echo.clone());

        run_task(
            &registry,
            &task(vec![step(
                "a",
                "echo",
                &[
                    ("one", literal(json!(1))),
                    ("two", literal(json!(2))),
                    ("three", literal(json!(3))),
                ],
                false,
            )]),
        )
        .await;

        // Three parameters, still exactly one invocation with the full map.
        let calls = echo.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 3);
    }
}
