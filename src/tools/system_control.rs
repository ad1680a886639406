//! Process-control tool: list processes, report uptime, signal a pid.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{Tool, ToolParam};
use crate::error::ToolError;

pub struct SystemControlTool;

async fn run(program: &str, args: &[&str]) -> Result<String, ToolError> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| ToolError::Failed(format!("Failed to spawn {program}: {e}")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ToolError::Failed(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )))
    }
}

#[async_trait]
impl Tool for SystemControlTool {
    fn name(&self) -> &str {
        "systemControl"
    }

    fn description(&self) -> &str {
        "Inspect and control host processes: list them, report uptime, or signal a pid."
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![
            ToolParam::new("command", "string", "One of: ps, uptime, kill"),
            ToolParam::new("pid", "integer", "Process id to signal (kill only)"),
        ]
    }

    async fn execute(&self, args: &Value) -> Result<Value, ToolError> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArgs("Missing required parameter: command".into()))?;
        debug!(command, "systemControl operation");

        match command {
            "ps" => run("ps", &["-eo", "pid,comm"]).await.map(Value::String),
            "uptime" => run("uptime", &[]).await.map(Value::String),
            "kill" => {
                let pid = args.get("pid").and_then(|v| v.as_u64()).ok_or_else(|| {
                    ToolError::InvalidArgs("Missing required parameter: pid".into())
                })?;
                run("kill", &[&pid.to_string()]).await.map(Value::String)
            }
            other => Err(ToolError::InvalidArgs(format!(
                "Unknown command \"{other}\" (expected ps, uptime, or kill)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn ps_lists_processes() {
        let result = SystemControlTool
            .execute(&json!({"command": "ps"}))
            .await
            .unwrap();
        let listing = result.as_str().unwrap();
        assert!(listing.to_lowercase().contains("pid"));
    }

    #[tokio::test]
    async fn invalid_command_fails() {
        let err = SystemControlTool
            .execute(&json!({"command": "invalid"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgs(_)));
        assert!(err.to_string().contains("invalid"));
    }

    #[tokio::test]
    async fn kill_requires_pid() {
        let err = SystemControlTool
            .execute(&json!({"command": "kill"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("pid"));
    }
}
