//! # Types Module
//!
//! Value types shared by every marshalling strategy: messages, tool
//! definitions and schemas, call options, and the immutable results produced
//! by one completed engine call.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat message with role and text content |
//! | [`ToolDefinition`] | Host-side tool: schema plus optional host implementation |
//! | [`ToolSchema`] | Engine-facing projection of a tool definition |
//! | [`AgentOptions`] | Canonical agent options, one struct for every backend |
//! | [`AgentResult`] | Text, step count and token usage of a finished run |
//!
//! ## Example
//!
//! ```rust
//! use agent_bridge::types::{Message, ToolDefinition};
//!
//! let messages = vec![
//!     Message::system("You are a helpful assistant"),
//!     Message::user("What's the weather?"),
//! ];
//! let tool = ToolDefinition::new("get_weather", "Get current weather for a location")
//!     .parameters(serde_json::json!({
//!         "type": "object",
//!         "properties": { "location": { "type": "string" } }
//!     }));
//! assert_eq!(messages.len(), 2);
//! assert!(!tool.has_host_impl());
//! ```

pub mod message;
pub mod options;
pub mod result;
pub mod tool;

pub use message::{Message, MessageRole};
pub use options::{AgentOptions, GenerateOptions, ProviderOptions};
pub use result::{
    AgentResult, GenerateResult, GenerateWithToolsResult, ProviderCapabilities, ToolCall, Usage,
};
pub use tool::{ToolDefinition, ToolError, ToolHandler, ToolSchema};
