//! Native engine contract.
//!
//! The engine ships as interchangeable modules with two calling conventions:
//!
//! - [`DirectModule`]: in-process, typed values cross the boundary as-is and
//!   the engine may call back into the host through a [`ToolExecutor`] and
//!   push progress into an [`EventSink`].
//! - [`EnvelopeModule`]: sandboxed/portable, every call is exactly one
//!   serialized message in and one out. No callback channel exists.
//!
//! Both describe themselves with a [`ModuleCapabilities`] record, which the
//! backend selector checks for structural compatibility before use.

pub mod process;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{
    AgentOptions, AgentResult, GenerateResult, GenerateWithToolsResult, Message,
    ProviderCapabilities, ProviderOptions, ToolSchema,
};

pub use crate::bridge::{EventSink, ToolExecutor};
pub use process::ProcessEnvelopeModule;

/// ABI revision of the native contract this crate speaks.
pub const ABI_VERSION: u32 = 1;

/// Opaque reference to a resource owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(pub u64);

impl Handle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure reported by a native module. Carries only a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct NativeError(String);

impl NativeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }

    pub fn into_message(self) -> String {
        self.0
    }
}

pub type NativeResult<T> = std::result::Result<T, NativeError>;

/// Capability record returned by a module's availability probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleCapabilities {
    pub abi_version: u32,
    /// Whether the module can call back into the host mid-run.
    #[serde(default)]
    pub tool_callbacks: bool,
    /// Whether the module implements the streamed run entry point.
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub version: Option<String>,
}

impl ModuleCapabilities {
    pub fn current(tool_callbacks: bool) -> Self {
        Self {
            abi_version: ABI_VERSION,
            tool_callbacks,
            streaming: false,
            version: None,
        }
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn is_compatible(&self) -> bool {
        self.abi_version == ABI_VERSION
    }
}

/// Arguments of one agent run, shared by both run entry points.
#[derive(Debug, Clone, Copy)]
pub struct AgentRunRequest<'a> {
    pub name: &'a str,
    pub provider: Handle,
    pub tools: &'a [ToolSchema],
    pub messages: &'a [Message],
    pub options: &'a AgentOptions,
}

/// In-process engine module.
#[async_trait]
pub trait DirectModule: Send + Sync {
    fn capabilities(&self) -> ModuleCapabilities;

    async fn create_provider(
        &self,
        provider_type: &str,
        model: &str,
        options: &ProviderOptions,
    ) -> NativeResult<Handle>;

    async fn destroy_provider(&self, handle: Handle) -> NativeResult<()>;

    async fn provider_capabilities(&self, handle: Handle) -> NativeResult<ProviderCapabilities>;

    async fn generate(
        &self,
        handle: Handle,
        messages: &[Message],
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> NativeResult<GenerateResult>;

    async fn generate_with_tools(
        &self,
        handle: Handle,
        messages: &[Message],
        tools: &[ToolSchema],
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> NativeResult<GenerateWithToolsResult>;

    /// Run an agent, resolving tool calls inside the engine from schemas alone.
    async fn agent_run(&self, request: AgentRunRequest<'_>) -> NativeResult<AgentResult>;

    /// Run an agent, delegating every tool call to the host through `executor`.
    async fn agent_run_with_tool_executor(
        &self,
        request: AgentRunRequest<'_>,
        executor: ToolExecutor,
    ) -> NativeResult<AgentResult>;

    /// Run an agent, emitting progress events into `sink` as the run advances.
    ///
    /// With an `executor`, tool calls are delegated to the host exactly as in
    /// [`agent_run_with_tool_executor`](Self::agent_run_with_tool_executor).
    async fn agent_stream(
        &self,
        request: AgentRunRequest<'_>,
        sink: EventSink,
        executor: Option<ToolExecutor>,
    ) -> NativeResult<AgentResult>;
}

/// Sandboxed engine module: one serialized message in, one out.
#[async_trait]
pub trait EnvelopeModule: Send + Sync {
    async fn call(&self, message: String) -> NativeResult<String>;
}
