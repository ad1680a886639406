//! Role-based permission gate applied before a tool may run.
//!
//! The dispatcher only sees a boolean: grant or deny. Denials look the same
//! whether or not the tool exists, so the gate never leaks catalog contents
//! to unauthorized roles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The operation a role is asking to perform on a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    /// Invoke the tool's capability.
    Execute,
    /// Change the tool's catalog state (enable/disable).
    Configure,
}

/// Permission policy consulted by the dispatcher and the HTTP surface.
///
/// Implementations may consult an external policy store; from the caller's
/// point of view the check is side-effect free.
#[async_trait]
pub trait PermissionPolicy: Send + Sync {
    /// Returns true when `role` may perform `action` on the named tool.
    /// Unknown roles deny.
    async fn check(&self, tool: &str, role: &str, action: PolicyAction) -> bool;
}

/// A single role's grants, as configured in `[[policy.roles]]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleGrant {
    pub name: String,
    /// Grants every tool, present and future. Also required for Configure.
    #[serde(default)]
    pub all_tools: bool,
    /// Explicit per-tool execute grants.
    #[serde(default)]
    pub tools: Vec<String>,
}

impl RoleGrant {
    /// The built-in grants: admin may do anything, user may run the
    /// workspace tools, guest exists but holds nothing.
    pub fn defaults() -> Vec<RoleGrant> {
        vec![
            RoleGrant {
                name: "admin".to_string(),
                all_tools: true,
                tools: Vec::new(),
            },
            RoleGrant {
                name: "user".to_string(),
                all_tools: false,
                tools: vec!["fileSystem".to_string(), "echo".to_string()],
            },
            RoleGrant {
                name: "guest".to_string(),
                all_tools: false,
                tools: Vec::new(),
            },
        ]
    }
}

/// In-process policy over a static role → grant table.
pub struct RolePolicy {
    grants: HashMap<String, RoleGrant>,
}

impl RolePolicy {
    pub fn new(grants: Vec<RoleGrant>) -> Self {
        Self {
            grants: grants
                .into_iter()
                .map(|grant| (grant.name.clone(), grant))
                .collect(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RoleGrant::defaults())
    }
}

#[async_trait]
impl PermissionPolicy for RolePolicy {
    async fn check(&self, tool: &str, role: &str, action: PolicyAction) -> bool {
        let Some(grant) = self.grants.get(role) else {
            return false;
        };
        match action {
            PolicyAction::Execute => {
                grant.all_tools || grant.tools.iter().any(|name| name == tool)
            }
            // Catalog mutation is reserved for roles holding the blanket
            // grant.
            PolicyAction::Configure => grant.all_tools,
        }
    }
}
