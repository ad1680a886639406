//! Diagnostic tool that returns its `text` argument unchanged.

use async_trait::async_trait;
use serde_json::Value;

use super::{Tool, ToolParam};
use crate::error::ToolError;

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the provided text unchanged. Useful for connectivity checks."
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![ToolParam::new("text", "string", "The text to echo back")]
    }

    async fn execute(&self, args: &Value) -> Result<Value, ToolError> {
        args.get("text")
            .cloned()
            .ok_or_else(|| ToolError::InvalidArgs("Missing required parameter: text".into()))
    }
}
