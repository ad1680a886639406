//! Tool system: the `Tool` capability trait and the catalog of registered
//! tools.
//!
//! A tool is a named, independently enableable unit of host-affecting
//! functionality behind a uniform async execute capability. The registry
//! owns the catalog and the per-tool enabled flag; it performs no argument
//! schema validation — parameter descriptors are informational only.

mod echo;
mod file_system;
mod system_control;

pub use echo::EchoTool;
pub use file_system::FileSystemTool;
pub use system_control::SystemControlTool;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{RegistryError, ToolError};

/// Informational parameter descriptor surfaced in the catalog listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    /// JSON Schema type: "string", "integer", "boolean", "array", "object".
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
}

impl ToolParam {
    pub fn new(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
        }
    }
}

/// A tool the dispatcher can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Vec<ToolParam>;

    /// Run the capability. The dispatcher does not interpret the payload;
    /// whatever value comes back is the caller's result verbatim.
    async fn execute(&self, args: &Value) -> Result<Value, ToolError>;
}

/// Serializable snapshot of one catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub parameters: Vec<ToolParam>,
}

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    enabled: bool,
}

impl RegisteredTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.tool.name().to_string(),
            description: self.tool.description().to_string(),
            enabled: self.enabled,
            parameters: self.tool.parameters(),
        }
    }
}

/// The catalog of invocable tools.
///
/// Names are unique per registry instance; registration order is preserved
/// for listings. Tools are never removed during the process lifetime, only
/// toggled.
pub struct ToolRegistry {
    inner: RwLock<RegistryInner>,
}

struct RegistryInner {
    order: Vec<String>,
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                order: Vec::new(),
                tools: HashMap::new(),
            }),
        }
    }

    /// Insert a tool, enabled. Fails if the name is already taken.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if inner.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        inner.order.push(name.clone());
        inner.tools.insert(
            name,
            RegisteredTool {
                tool,
                enabled: true,
            },
        );
        Ok(())
    }

    /// Look up a tool handle and its current enabled flag.
    pub fn find(&self, name: &str) -> Option<(Arc<dyn Tool>, bool)> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner
            .tools
            .get(name)
            .map(|entry| (entry.tool.clone(), entry.enabled))
    }

    /// Independent snapshot of all descriptors in registration order.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner
            .order
            .iter()
            .filter_map(|name| inner.tools.get(name))
            .map(RegisteredTool::descriptor)
            .collect()
    }

    /// Flip a tool's enabled flag, returning the updated descriptor.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<ToolDescriptor, RegistryError> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let entry = inner
            .tools
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?;
        entry.enabled = enabled;
        Ok(entry.descriptor())
    }

    pub fn count(&self) -> usize {
        self.inner.read().expect("registry lock poisoned").tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
