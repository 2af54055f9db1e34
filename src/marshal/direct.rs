//! Direct strategy: typed values straight into an in-process module.

use async_trait::async_trait;
use std::sync::Arc;

use super::{Marshaller, Strategy};
use crate::native::{
    AgentRunRequest, DirectModule, EventSink, Handle, ModuleCapabilities, ToolExecutor,
};
use crate::types::{
    AgentResult, GenerateOptions, GenerateResult, GenerateWithToolsResult, Message,
    ProviderCapabilities, ProviderOptions, ToolSchema,
};
use crate::{Error, Result};

/// Marshaller for [`DirectModule`]s. No reserialization; `None` means omitted.
pub struct DirectMarshaller {
    name: String,
    module: Arc<dyn DirectModule>,
    capabilities: ModuleCapabilities,
}

impl DirectMarshaller {
    pub fn new(name: impl Into<String>, module: Arc<dyn DirectModule>) -> Self {
        let capabilities = module.capabilities();
        Self {
            name: name.into(),
            module,
            capabilities,
        }
    }

    pub fn capabilities(&self) -> &ModuleCapabilities {
        &self.capabilities
    }
}

#[async_trait]
impl Marshaller for DirectMarshaller {
    fn strategy(&self) -> Strategy {
        Strategy::Direct
    }

    fn backend_name(&self) -> &str {
        &self.name
    }

    fn supports_tool_callbacks(&self) -> bool {
        self.capabilities.tool_callbacks
    }

    fn supports_streaming(&self) -> bool {
        self.capabilities.streaming
    }

    async fn create_provider(
        &self,
        provider_type: &str,
        model: &str,
        options: &ProviderOptions,
    ) -> Result<Handle> {
        Ok(self.module.create_provider(provider_type, model, options).await?)
    }

    async fn destroy_provider(&self, handle: Handle) -> Result<()> {
        Ok(self.module.destroy_provider(handle).await?)
    }

    async fn provider_capabilities(&self, handle: Handle) -> Result<ProviderCapabilities> {
        Ok(self.module.provider_capabilities(handle).await?)
    }

    async fn generate(
        &self,
        handle: Handle,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<GenerateResult> {
        Ok(self
            .module
            .generate(handle, messages, options.temperature, options.max_tokens)
            .await?)
    }

    async fn generate_with_tools(
        &self,
        handle: Handle,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerateOptions,
    ) -> Result<GenerateWithToolsResult> {
        Ok(self
            .module
            .generate_with_tools(handle, messages, tools, options.temperature, options.max_tokens)
            .await?)
    }

    async fn agent_run(&self, request: AgentRunRequest<'_>) -> Result<AgentResult> {
        Ok(self.module.agent_run(request).await?)
    }

    async fn agent_run_with_tool_executor(
        &self,
        request: AgentRunRequest<'_>,
        executor: ToolExecutor,
    ) -> Result<AgentResult> {
        if !self.capabilities.tool_callbacks {
            return Err(Error::capability_unavailable("tool callbacks", &self.name));
        }
        Ok(self
            .module
            .agent_run_with_tool_executor(request, executor)
            .await?)
    }

    async fn agent_stream(
        &self,
        request: AgentRunRequest<'_>,
        sink: EventSink,
        executor: Option<ToolExecutor>,
    ) -> Result<AgentResult> {
        if !self.capabilities.streaming {
            return Err(Error::capability_unavailable("streaming", &self.name));
        }
        if executor.is_some() && !self.capabilities.tool_callbacks {
            return Err(Error::capability_unavailable("tool callbacks", &self.name));
        }
        Ok(self.module.agent_stream(request, sink, executor).await?)
    }
}
