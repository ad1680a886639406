//! Filesystem tool: read, write, and list under a workspace root.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{Tool, ToolParam};
use crate::error::ToolError;

pub struct FileSystemTool {
    workspace_dir: PathBuf,
}

impl FileSystemTool {
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
        }
    }

    /// Expand `~` and resolve relative paths against the workspace root.
    fn resolve(&self, raw: &str) -> PathBuf {
        let expanded = shellexpand::tilde(raw);
        let path = Path::new(expanded.as_ref());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_dir.join(path)
        }
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidArgs(format!("Missing required parameter: {key}")))
}

#[async_trait]
impl Tool for FileSystemTool {
    fn name(&self) -> &str {
        "fileSystem"
    }

    fn description(&self) -> &str {
        "Read, write, and list files under the workspace directory."
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![
            ToolParam::new("operation", "string", "One of: read, write, list"),
            ToolParam::new("path", "string", "Target path, relative to the workspace"),
            ToolParam::new("content", "string", "Content to write (write only)"),
        ]
    }

    async fn execute(&self, args: &Value) -> Result<Value, ToolError> {
        let operation = required_str(args, "operation")?;
        let path = self.resolve(required_str(args, "path")?);
        debug!(operation, path = %path.display(), "fileSystem operation");

        match operation {
            "read" => {
                let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    ToolError::Failed(format!("Failed to read '{}': {}", path.display(), e))
                })?;
                Ok(Value::String(content))
            }
            "write" => {
                let content = required_str(args, "content")?;
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, content).await.map_err(|e| {
                    ToolError::Failed(format!("Failed to write '{}': {}", path.display(), e))
                })?;
                Ok(json!({ "path": path.display().to_string(), "bytes": content.len() }))
            }
            "list" => {
                let mut entries = tokio::fs::read_dir(&path).await.map_err(|e| {
                    ToolError::Failed(format!("Failed to list '{}': {}", path.display(), e))
                })?;
                let mut names = Vec::new();
                while let Some(entry) = entries.next_entry().await? {
                    names.push(entry.file_name().to_string_lossy().to_string());
                }
                names.sort();
                Ok(json!(names))
            }
            other => Err(ToolError::InvalidArgs(format!(
                "Unknown operation \"{other}\" (expected read, write, or list)"
            ))),
        }
    }
}
