//! Envelope strategy: one serialized message per call.
//!
//! Request: `{"method": "<name>", "args": {...}}`.
//! Response: `{"ok": true, "value": ...}` or `{"ok": false, "error": "..."}`.
//!
//! The message shape is fixed, so every optional field is always written; an
//! absent value is sent as `null`. The mapping lives in [`sentinel`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{Marshaller, Strategy};
use crate::native::{
    AgentRunRequest, EnvelopeModule, EventSink, Handle, ModuleCapabilities, ToolExecutor,
};
use crate::types::{
    AgentResult, GenerateOptions, GenerateResult, GenerateWithToolsResult, Message,
    ProviderCapabilities, ProviderOptions, ToolSchema,
};
use crate::{Error, ErrorContext, Result};

/// Field-presence to sentinel mapping for envelope messages.
pub mod sentinel {
    use super::*;
    use crate::types::AgentOptions;

    /// `None` becomes `null`. A value that fails to serialize is an error,
    /// never a silent `null`.
    pub fn optional<T: Serialize>(value: &Option<T>) -> serde_json::Result<Value> {
        match value {
            Some(v) => serde_json::to_value(v),
            None => Ok(Value::Null),
        }
    }

    pub fn provider_options(options: &ProviderOptions) -> serde_json::Result<Value> {
        Ok(json!({
            "apiKey": options.api_key,
            "baseUrl": optional(&options.base_url)?,
            "timeoutMs": optional(&options.timeout_ms)?,
            "maxRetries": optional(&options.max_retries)?,
            "organization": optional(&options.organization)?,
        }))
    }

    pub fn agent_options(options: &AgentOptions) -> serde_json::Result<Value> {
        Ok(json!({
            "instructions": optional(&options.instructions)?,
            "maxSteps": optional(&options.max_steps)?,
            "temperature": optional(&options.temperature)?,
            "topP": optional(&options.top_p)?,
            "maxTokens": optional(&options.max_tokens)?,
            "seed": optional(&options.seed)?,
            "stopOnTool": optional(&options.stop_on_tool)?,
            "outputSchema": optional(&options.output_schema)?,
        }))
    }

    pub fn tool_schemas(tools: &[ToolSchema]) -> serde_json::Result<Value> {
        tools
            .iter()
            .map(|t| {
                Ok(json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": optional(&t.parameters)?,
                }))
            })
            .collect::<serde_json::Result<Vec<_>>>()
            .map(Value::Array)
    }

    pub fn messages(messages: &[Message]) -> Value {
        Value::Array(
            messages
                .iter()
                .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
                .collect(),
        )
    }
}

#[derive(Debug, Serialize)]
struct EnvelopeRequest<'a> {
    method: &'a str,
    args: Value,
}

#[derive(Debug, Deserialize)]
struct EnvelopeResponse {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

async fn invoke<T: DeserializeOwned>(
    module: &dyn EnvelopeModule,
    method: &str,
    args: Value,
) -> Result<T> {
    let message = serde_json::to_string(&EnvelopeRequest { method, args })?;
    let reply = module.call(message).await?;

    let response: EnvelopeResponse = serde_json::from_str(&reply).map_err(|e| {
        Error::validation_with_context(
            format!("malformed envelope response: {e}"),
            ErrorContext::new()
                .with_field_path(method)
                .with_source("envelope_marshaller"),
        )
    })?;

    if !response.ok {
        return Err(Error::Engine(
            response
                .error
                .unwrap_or_else(|| format!("{method} failed without a message")),
        ));
    }

    serde_json::from_value(response.value).map_err(|e| {
        Error::validation_with_context(
            format!("unexpected {method} result: {e}"),
            ErrorContext::new()
                .with_field_path(method)
                .with_source("envelope_marshaller"),
        )
    })
}

/// Ask an envelope module for its capability record.
pub async fn describe(module: &dyn EnvelopeModule) -> Result<ModuleCapabilities> {
    invoke(module, "describe", Value::Null).await
}

/// Marshaller for [`EnvelopeModule`]s.
pub struct EnvelopeMarshaller {
    name: String,
    module: Arc<dyn EnvelopeModule>,
}

impl EnvelopeMarshaller {
    pub fn new(name: impl Into<String>, module: Arc<dyn EnvelopeModule>) -> Self {
        Self {
            name: name.into(),
            module,
        }
    }

    async fn invoke<T: DeserializeOwned>(&self, method: &str, args: Value) -> Result<T> {
        invoke(self.module.as_ref(), method, args).await
    }
}

#[async_trait]
impl Marshaller for EnvelopeMarshaller {
    fn strategy(&self) -> Strategy {
        Strategy::Envelope
    }

    fn backend_name(&self) -> &str {
        &self.name
    }

    fn supports_tool_callbacks(&self) -> bool {
        false
    }

    fn supports_streaming(&self) -> bool {
        false
    }

    async fn create_provider(
        &self,
        provider_type: &str,
        model: &str,
        options: &ProviderOptions,
    ) -> Result<Handle> {
        self.invoke(
            "createProvider",
            json!({
                "type": provider_type,
                "model": model,
                "options": sentinel::provider_options(options)?,
            }),
        )
        .await
    }

    async fn destroy_provider(&self, handle: Handle) -> Result<()> {
        let _: Value = self
            .invoke("destroyProvider", json!({ "handle": handle }))
            .await?;
        Ok(())
    }

    async fn provider_capabilities(&self, handle: Handle) -> Result<ProviderCapabilities> {
        self.invoke("getProviderCapabilities", json!({ "handle": handle }))
            .await
    }

    async fn generate(
        &self,
        handle: Handle,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<GenerateResult> {
        self.invoke(
            "generate",
            json!({
                "handle": handle,
                "messages": sentinel::messages(messages),
                "temperature": options.temperature,
                "maxTokens": options.max_tokens,
            }),
        )
        .await
    }

    async fn generate_with_tools(
        &self,
        handle: Handle,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerateOptions,
    ) -> Result<GenerateWithToolsResult> {
        self.invoke(
            "generateWithTools",
            json!({
                "handle": handle,
                "messages": sentinel::messages(messages),
                "tools": sentinel::tool_schemas(tools)?,
                "temperature": options.temperature,
                "maxTokens": options.max_tokens,
            }),
        )
        .await
    }

    async fn agent_run(&self, request: AgentRunRequest<'_>) -> Result<AgentResult> {
        self.invoke(
            "agentRun",
            json!({
                "name": request.name,
                "providerHandle": request.provider,
                "tools": sentinel::tool_schemas(request.tools)?,
                "messages": sentinel::messages(request.messages),
                "options": sentinel::agent_options(request.options)?,
            }),
        )
        .await
    }

    async fn agent_run_with_tool_executor(
        &self,
        _request: AgentRunRequest<'_>,
        _executor: ToolExecutor,
    ) -> Result<AgentResult> {
        Err(Error::capability_unavailable("tool callbacks", &self.name))
    }

    /// A single reply per call leaves no room for intermediate events.
    async fn agent_stream(
        &self,
        _request: AgentRunRequest<'_>,
        _sink: EventSink,
        _executor: Option<ToolExecutor>,
    ) -> Result<AgentResult> {
        Err(Error::capability_unavailable("streaming", &self.name))
    }
}
