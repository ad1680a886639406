//! Error taxonomy for the tool pipeline.
//!
//! Registration, dispatch, tool, and analytics failures are separate types
//! so each layer can only surface the failures it is allowed to produce:
//! the registry never reports authorization problems, the dispatcher never
//! reports duplicate names, and analytics failures never escape the
//! dispatcher at all (they are logged and swallowed).

use thiserror::Error;

/// Failures raised by the tool catalog itself.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A tool with the same name is already registered.
    #[error("tool \"{0}\" is already registered")]
    DuplicateTool(String),

    /// The named tool is not in the catalog.
    #[error("tool \"{0}\" not found")]
    UnknownTool(String),
}

/// A tool capability failed to execute.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The arguments were missing a required field or had the wrong shape.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// The capability itself failed.
    #[error("{0}")]
    Failed(String),

    /// An underlying I/O operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures raised by [`crate::dispatcher::ExecutionDispatcher::execute`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The tool is missing from the catalog or currently disabled.
    /// Raised before any execution record exists.
    #[error("tool \"{0}\" not found or disabled")]
    ToolUnavailable(String),

    /// The role has no grant to execute the tool.
    /// Raised before any execution record exists.
    #[error("role \"{role}\" is not permitted to execute tool \"{tool}\"")]
    Unauthorized { tool: String, role: String },

    /// The capability ran and failed. The original tool failure is surfaced
    /// verbatim; an error-status execution record was still emitted.
    #[error(transparent)]
    Execution(#[from] ToolError),
}

/// An analytics sink rejected an execution record. Never surfaced to the
/// caller of the dispatcher; logged and discarded.
#[derive(Debug, Error)]
#[error("analytics tracking failed: {0}")]
pub struct AnalyticsError(pub String);

/// The chat backend failed to produce a reply.
#[derive(Debug, Error)]
#[error("chat backend error: {0}")]
pub struct ChatError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_is_transparent() {
        let original = ToolError::Failed("disk on fire".into());
        let wrapped = DispatchError::from(original);
        // The caller must observe the raw tool failure, not a generic shell.
        assert_eq!(wrapped.to_string(), "disk on fire");
    }

    #[test]
    fn unavailable_and_unauthorized_are_distinct() {
        let unavailable = DispatchError::ToolUnavailable("fileSystem".into());
        let denied = DispatchError::Unauthorized {
            tool: "systemControl".into(),
            role: "guest".into(),
        };
        assert!(unavailable.to_string().contains("not found or disabled"));
        assert!(denied.to_string().contains("guest"));
        assert!(denied.to_string().contains("systemControl"));
    }
}
