//! Minimal prelude for application code.

pub use crate::facade::{AgentBridge, AgentBuilder, AgentFacade, ProviderFacade};
pub use crate::types::{
    AgentOptions, AgentResult, GenerateOptions, GenerateResult, Message, MessageRole,
    ProviderCapabilities, ProviderOptions, ToolDefinition, ToolError,
};
pub use crate::bridge::{event_channel, EventStream, StreamEvent};
pub use crate::{Error, Result};
