use thiserror::Error;

/// Errors that can occur during tool execution.
///
/// Only [`ToolError::Timeout`] and [`ToolError::Transport`] abort a query;
/// the rest are handed back to the model as error observations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("timeout after {0}ms")]
    Timeout(u64),
    #[error("transport: {0}")]
    Transport(String),
}

impl ToolError {
    /// True when the tool server could not be reached or did not answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        assert!(ToolError::Timeout(30_000).is_transport());
        assert!(ToolError::Transport("pipe closed".into()).is_transport());
        assert!(!ToolError::NotFound("x".into()).is_transport());
        assert!(!ToolError::InvalidInput("x".into()).is_transport());
    }
}
