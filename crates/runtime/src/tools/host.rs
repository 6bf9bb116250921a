//! Tool host trait.

use crate::model::{ToolCall, ToolOutcome, ToolSpec};
use crate::tools::ToolError;
use std::future::Future;

/// Trait for tool execution hosts.
///
/// Implementations provide tool specifications and execute tool calls.
/// This is the boundary between the model loop and side effects.
pub trait ToolHost: Send + Sync {
    /// Get available tool specifications.
    fn specs(&self) -> &[ToolSpec];

    /// Execute a tool call.
    ///
    /// A failure reported by the tool itself is an `Ok` carrying an error
    /// outcome; `Err` means the call never completed.
    fn execute(
        &self,
        call: &ToolCall,
    ) -> impl Future<Output = Result<ToolOutcome, ToolError>> + Send;

    /// Whether a tool with this name is in the catalog.
    fn has_tool(&self, name: &str) -> bool {
        self.specs().iter().any(|spec| spec.name == name)
    }
}
