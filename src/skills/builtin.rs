use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::page::controlled::DocumentRenderer;
use crate::skills::types::{Skill, StepOutput};

/// Pulls a parameter as a string. Non-string values (e.g. data piped from a
/// previous step) are serialized rather than rejected.
fn param_str(params: &Map<String, Value>, key: &str) -> String {
    match params.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(v) => v.to_string(),
    }
}

fn absolute(path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(p))
            .unwrap_or_else(|_| p.to_path_buf())
    }
}

// ── readFile ─────────────────────────────────────────────────────────────────

pub struct ReadFile;

#[async_trait]
impl Skill for ReadFile {
    fn name(&self) -> &str {
        "readFile"
    }

    fn description(&self) -> &str {
        "Read a file in the dir takes path to the file"
    }

    fn parameters(&self) -> Value {
        json!({ "path": "string" })
    }

    async fn invoke(&self, params: &Map<String, Value>) -> StepOutput {
        let path = absolute(&param_str(params, "path"));
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => StepOutput::success(data),
            Err(e) => StepOutput::failure(e.to_string()),
        }
    }
}

// ── writeFile ────────────────────────────────────────────────────────────────

pub struct WriteFile;

#[async_trait]
impl Skill for WriteFile {
    fn name(&self) -> &str {
        "writeFile"
    }

    fn description(&self) -> &str {
        "Write a file in the dir takes path to the file"
    }

    fn parameters(&self) -> Value {
        json!({ "path": "string", "data": "string" })
    }

    async fn invoke(&self, params: &Map<String, Value>) -> StepOutput {
        let path = absolute(&param_str(params, "path"));
        let data = param_str(params, "data");
        match tokio::fs::write(&path, data).await {
            Ok(()) => StepOutput::success("File written successfully"),
            Err(e) => StepOutput::failure(e.to_string()),
        }
    }
}

// ── runTerminalCommand ───────────────────────────────────────────────────────

pub struct RunTerminalCommand;

#[async_trait]
impl Skill for RunTerminalCommand {
    fn name(&self) -> &str {
        "runTerminalCommand"
    }

    fn description(&self) -> &str {
        "Run a terminal command takes command to run"
    }

    fn parameters(&self) -> Value {
        json!({ "command": "string" })
    }

    async fn invoke(&self, params: &Map<String, Value>) -> StepOutput {
        let command = param_str(params, "command");

        #[cfg(windows)]
        let output = tokio::process::Command::new("cmd")
            .args(["/C", &command])
            .output()
            .await;
        #[cfg(not(windows))]
        let output = tokio::process::Command::new("sh")
            .args(["-c", &command])
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                StepOutput::success(String::from_utf8_lossy(&out.stdout).trim().to_string())
            }
            Ok(out) => {
                // stderr first, then stdout, then the exit status
                let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
                let stdout = String::from_utf8_lossy(&out.stdout).trim().to_string();
                let data = if !stderr.is_empty() {
                    stderr
                } else if !stdout.is_empty() {
                    stdout
                } else {
                    format!("command exited with {}", out.status)
                };
                StepOutput::failure(data)
            }
            Err(e) => StepOutput::failure(e.to_string()),
        }
    }
}

// ── htmlDocumentToPdf ────────────────────────────────────────────────────────

pub struct HtmlDocumentToPdf {
    renderer: Arc<dyn DocumentRenderer>,
}

impl HtmlDocumentToPdf {
    pub fn new(renderer: Arc<dyn DocumentRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl Skill for HtmlDocumentToPdf {
    fn name(&self) -> &str {
        "htmlDocumentToPdf"
    }

    fn description(&self) -> &str {
        "Convert an HTML document to a PDF file takes path to the file and return the path to the PDF file"
    }

    fn parameters(&self) -> Value {
        json!({ "inputPath": "string", "outputPath": "string" })
    }

    async fn invoke(&self, params: &Map<String, Value>) -> StepOutput {
        let input = param_str(params, "inputPath");
        let url = if input.starts_with("http") {
            input
        } else {
            format!("file://{}", absolute(&input).display())
        };

        let output = PathBuf::from(format!("{}.pdf", absolute(&param_str(params, "outputPath")).display()));
        match self.renderer.render_pdf(&url, &output).await {
            Ok(written) => StepOutput::success(written.display().to_string()),
            Err(e) => StepOutput::failure(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{}-{}", uuid::Uuid::new_v4(), name))
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let path = temp_path("note.txt");
        let path_str = path.display().to_string();

        let written = WriteFile
            .invoke(&params(&[
                ("path", json!(path_str)),
                ("data", json!("hello from a step")),
            ]))
            .await;
        assert!(written.ok);
        assert_eq!(written.data, json!("File written successfully"));

        let read = ReadFile.invoke(&params(&[("path", json!(path_str))])).await;
        assert!(read.ok);
        assert_eq!(read.data, json!("hello from a step"));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_read_missing_file_reports_failure() {
        let out = ReadFile
            .invoke(&params(&[("path", json!("/nonexistent/definitely-not-here"))]))
            .await;
        assert!(!out.ok);
        assert!(out.data.as_str().is_some());
    }

    #[tokio::test]
    async fn test_terminal_command_captures_stdout() {
        let out = RunTerminalCommand
            .invoke(&params(&[("command", json!("echo relay-test"))]))
            .await;
        assert!(out.ok);
        assert_eq!(out.data, json!("relay-test"));
    }

    #[tokio::test]
    async fn test_terminal_command_failure_captures_stderr() {
        let out = RunTerminalCommand
            .invoke(&params(&[("command", json!("ls /definitely-not-a-dir-xyz"))]))
            .await;
        assert!(!out.ok);
        assert!(!out.data.as_str().unwrap_or_default().is_empty());
    }
}
