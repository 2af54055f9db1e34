//! Agent facade: provider, static options and a fixed tool table.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use super::provider::ProviderFacade;
use crate::bridge::{EventSink, RunMode, ToolCallBridge, ToolTable};
use crate::native::AgentRunRequest;
use crate::types::{AgentOptions, AgentResult, Message, ToolDefinition};
use crate::{Error, Result};

/// A configured agent. Its tool table never changes after construction.
#[derive(Debug, Clone)]
pub struct AgentFacade {
    name: String,
    provider: Arc<ProviderFacade>,
    options: AgentOptions,
    tools: Arc<ToolTable>,
}

impl AgentFacade {
    pub fn new(
        name: impl Into<String>,
        provider: Arc<ProviderFacade>,
        options: AgentOptions,
        tools: Vec<ToolDefinition>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            provider,
            options,
            tools: Arc::new(ToolTable::new(tools)?),
        })
    }

    pub fn builder(name: impl Into<String>, provider: Arc<ProviderFacade>) -> AgentBuilder {
        AgentBuilder::new(name, provider)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &Arc<ProviderFacade> {
        &self.provider
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn tools(&self) -> &ToolTable {
        &self.tools
    }

    /// Mode implied by the tool table alone.
    pub fn mode(&self) -> RunMode {
        self.tools.mode()
    }

    /// Mode a run will actually use on the provider's backend.
    ///
    /// A backend without a callback channel always runs in Mode A.
    pub fn effective_mode(&self) -> RunMode {
        match self.mode() {
            RunMode::HostBridged if !self.provider.marshaller().supports_tool_callbacks() => {
                RunMode::EngineResolved
            }
            mode => mode,
        }
    }

    /// Run the agent over `messages` to completion.
    pub async fn run(&self, messages: &[Message]) -> Result<AgentResult> {
        self.execute(messages, None).await
    }

    /// Run the agent, pushing progress events into `sink` as the engine emits them.
    ///
    /// Requires a backend that reports streaming support; otherwise fails with
    /// [`Error::CapabilityUnavailable`] before anything reaches the engine.
    /// Host tool implementations are serviced exactly as in [`run`](Self::run).
    pub async fn stream(&self, messages: &[Message], sink: EventSink) -> Result<AgentResult> {
        self.execute(messages, Some(sink)).await
    }

    async fn execute(&self, messages: &[Message], sink: Option<EventSink>) -> Result<AgentResult> {
        let handle = self.provider.live_handle()?;
        let marshaller = self.provider.marshaller().clone();

        if sink.is_some() && !marshaller.supports_streaming() {
            return Err(Error::capability_unavailable("streaming", marshaller.backend_name()));
        }

        let mode = self.effective_mode();
        if mode != self.mode() {
            debug!(
                agent = %self.name,
                backend = %marshaller.backend_name(),
                strategy = %marshaller.strategy(),
                "backend has no tool callbacks; host tool implementations will not be invoked"
            );
        }

        let schemas = self.tools.schemas();
        let request = AgentRunRequest {
            name: &self.name,
            provider: handle,
            tools: &schemas,
            messages,
            options: &self.options,
        };

        let run_id = Uuid::new_v4();
        let span = match sink {
            Some(_) => info_span!("agent_stream", agent = %self.name, %run_id, mode = ?mode),
            None => info_span!("agent_run", agent = %self.name, %run_id, mode = ?mode),
        };
        let result = async {
            match (mode, sink) {
                (RunMode::EngineResolved, None) => marshaller.agent_run(request).await,
                (RunMode::EngineResolved, Some(sink)) => {
                    marshaller.agent_stream(request, sink, None).await
                }
                (RunMode::HostBridged, sink) => {
                    let bridge = ToolCallBridge::new(self.tools.clone());
                    let (executor, endpoint) = bridge.channel();
                    match sink {
                        Some(sink) => {
                            let engine = marshaller.agent_stream(request, sink, Some(executor));
                            bridge.serve(engine, endpoint).await
                        }
                        None => {
                            let engine = marshaller.agent_run_with_tool_executor(request, executor);
                            bridge.serve(engine, endpoint).await
                        }
                    }
                }
            }
        }
        .instrument(span)
        .await?;

        info!(
            agent = %self.name,
            %run_id,
            steps = result.steps,
            input_tokens = result.usage.input_tokens,
            output_tokens = result.usage.output_tokens,
            "agent run finished"
        );
        Ok(result)
    }

    /// Run with a single user message.
    pub async fn run_prompt(&self, prompt: impl Into<String>) -> Result<AgentResult> {
        self.run(&[Message::user(prompt)]).await
    }
}

/// Builder for [`AgentFacade`].
#[derive(Debug)]
pub struct AgentBuilder {
    name: String,
    provider: Arc<ProviderFacade>,
    options: AgentOptions,
    tools: Vec<ToolDefinition>,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>, provider: Arc<ProviderFacade>) -> Self {
        Self {
            name: name.into(),
            provider,
            options: AgentOptions::default(),
            tools: Vec::new(),
        }
    }

    pub fn options(mut self, options: AgentOptions) -> Self {
        self.options = options;
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.options.instructions = Some(instructions.into());
        self
    }

    pub fn max_steps(mut self, n: u32) -> Self {
        self.options.max_steps = Some(n);
        self
    }

    pub fn temperature(mut self, t: f64) -> Self {
        self.options.temperature = Some(t);
        self
    }

    pub fn top_p(mut self, p: f64) -> Self {
        self.options.top_p = Some(p);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.options.max_tokens = Some(n);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.options.seed = Some(seed);
        self
    }

    pub fn stop_on_tool(mut self, tool: impl Into<String>) -> Self {
        self.options.stop_on_tool = Some(tool.into());
        self
    }

    pub fn output_schema(mut self, schema: Value) -> Self {
        self.options.output_schema = Some(schema);
        self
    }

    pub fn tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = ToolDefinition>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Fails if two tools share a name.
    pub fn build(self) -> Result<AgentFacade> {
        AgentFacade::new(self.name, self.provider, self.options, self.tools)
    }
}
