use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A task the model embedded in its reply instead of a user-facing answer.
/// Field names are camelCase on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub task_id: String,
    /// Message the model wants to surface to the user alongside the results.
    pub user_message: String,
    /// Ordered steps; order is execution order.
    pub procedure: Vec<ProcedureStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureStep {
    pub step_id: String,
    pub skill_name: String,
    #[serde(default)]
    pub input: BTreeMap<String, StepInput>,
    pub return_results_to_model: bool,
}

/// A step parameter: either a literal value or a reference to the output of
/// an earlier step. `FromStep` must come first so `{"fromStep": ...}` objects
/// are not swallowed by the literal variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepInput {
    FromStep {
        #[serde(rename = "fromStep")]
        from_step: String,
    },
    Literal(Value),
}

/// Result of one skill invocation, recorded under the step's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutput {
    pub ok: bool,
    pub data: Value,
}

impl StepOutput {
    pub fn success(data: impl Into<Value>) -> Self {
        Self {
            ok: true,
            data: data.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: Value::String(message.into()),
        }
    }
}

/// A named, locally executed capability the model can request by task step.
///
/// Implementations must not error past this boundary: every failure is
/// reported as `StepOutput { ok: false, .. }`.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Wire name the model addresses this skill by.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Parameter name → type tag, surfaced to the model via the manifest.
    fn parameters(&self) -> Value;

    async fn invoke(&self, params: &serde_json::Map<String, Value>) -> StepOutput;
}
