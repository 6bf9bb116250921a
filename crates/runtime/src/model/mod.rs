//! LLM protocol types and backend trait.

pub mod errors;
pub mod types;

pub use errors::ModelError;
pub use types::{
    Backend, FinishReason, Message, ModelRequest, ModelResponse, Part, Role, ToolCall,
    ToolOutcome, ToolResult, ToolSpec, Usage,
};
