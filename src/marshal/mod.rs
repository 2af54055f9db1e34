//! Marshalling strategies.
//!
//! Facades only ever talk to a [`Marshaller`]. Each strategy owns the rules
//! for how values, and in particular absent optional fields, reach its kind of
//! native module:
//!
//! | Strategy | Absent field | Tool callbacks | Streaming |
//! |----------|--------------|----------------|-----------|
//! | [`DirectMarshaller`] | omitted (`None` passed through) | yes, when the module reports them | yes, when the module reports it |
//! | [`EnvelopeMarshaller`] | explicit `null` sentinel | never | never |

pub mod direct;
pub mod envelope;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::native::{AgentRunRequest, EventSink, Handle, ToolExecutor};
use crate::types::{
    AgentResult, GenerateOptions, GenerateResult, GenerateWithToolsResult, Message,
    ProviderCapabilities, ProviderOptions, ToolSchema,
};
use crate::Result;

pub use direct::DirectMarshaller;
pub use envelope::EnvelopeMarshaller;

/// Calling convention of the active native module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Direct,
    Envelope,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Direct => f.write_str("direct"),
            Strategy::Envelope => f.write_str("envelope"),
        }
    }
}

/// Backend-agnostic view of the native contract.
#[async_trait]
pub trait Marshaller: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Name of the candidate module this marshaller talks to.
    fn backend_name(&self) -> &str;

    /// Whether `agent_run_with_tool_executor` can be used.
    fn supports_tool_callbacks(&self) -> bool;

    /// Whether `agent_stream` can be used.
    fn supports_streaming(&self) -> bool;

    async fn create_provider(
        &self,
        provider_type: &str,
        model: &str,
        options: &ProviderOptions,
    ) -> Result<Handle>;

    async fn destroy_provider(&self, handle: Handle) -> Result<()>;

    async fn provider_capabilities(&self, handle: Handle) -> Result<ProviderCapabilities>;

    async fn generate(
        &self,
        handle: Handle,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<GenerateResult>;

    async fn generate_with_tools(
        &self,
        handle: Handle,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerateOptions,
    ) -> Result<GenerateWithToolsResult>;

    async fn agent_run(&self, request: AgentRunRequest<'_>) -> Result<AgentResult>;

    async fn agent_run_with_tool_executor(
        &self,
        request: AgentRunRequest<'_>,
        executor: ToolExecutor,
    ) -> Result<AgentResult>;

    async fn agent_stream(
        &self,
        request: AgentRunRequest<'_>,
        sink: EventSink,
        executor: Option<ToolExecutor>,
    ) -> Result<AgentResult>;
}

impl fmt::Debug for dyn Marshaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Marshaller")
            .field("strategy", &self.strategy())
            .field("backend", &self.backend_name())
            .finish()
    }
}
