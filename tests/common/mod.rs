//! Scripted fake engine shared by the integration tests.
//!
//! [`ScriptedEngine`] implements the in-process contract; [`EnvelopeEngine`]
//! exposes the same engine through the one-message-per-call contract.

#![allow(dead_code)]

use agent_bridge::backend::{Backend, BackendSelector};
use agent_bridge::bridge::ToolCallEnvelope;
use agent_bridge::native::{
    AgentRunRequest, DirectModule, EnvelopeModule, EventSink, ModuleCapabilities, NativeError,
    NativeResult, ToolExecutor,
};
use agent_bridge::types::{
    AgentOptions, AgentResult, GenerateResult, GenerateWithToolsResult, Message,
    ProviderCapabilities, ProviderOptions, ToolCall, ToolSchema, Usage,
};
use agent_bridge::{AgentBridge, Handle};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One engine step.
#[derive(Debug, Clone)]
pub enum Step {
    /// Call these tools concurrently, then continue.
    Tools(Vec<(String, Value)>),
    /// Finish with this text.
    Final(String),
}

impl Step {
    pub fn call(tool: &str, args: Value) -> Self {
        Step::Tools(vec![(tool.to_string(), args)])
    }

    pub fn finish(text: &str) -> Self {
        Step::Final(text.to_string())
    }
}

/// Which entry point a run came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    AgentRun,
    WithToolExecutor,
    Stream,
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub entry: Entry,
    pub name: String,
    pub tools: Vec<ToolSchema>,
    pub options: AgentOptions,
}

pub struct ScriptedEngine {
    callbacks: bool,
    streaming: bool,
    abi_version: u32,
    next_handle: AtomicU64,
    live: Mutex<HashSet<u64>>,
    script: Mutex<Vec<Step>>,
    pub destroy_calls: AtomicUsize,
    pub finals: AtomicUsize,
    pub created: Mutex<Vec<(String, String, ProviderOptions)>>,
    pub runs: Mutex<Vec<RunRecord>>,
    /// Answers received from the host, in request order.
    pub tool_replies: Mutex<Vec<NativeResult<String>>>,
    /// Calls the engine resolved itself (schema-only runs).
    pub engine_resolved: Mutex<Vec<String>>,
    pub generate_options: Mutex<Vec<(Option<f64>, Option<u32>)>>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Self::build(true, true, agent_bridge::native::ABI_VERSION)
    }

    pub fn without_callbacks() -> Arc<Self> {
        Self::build(false, true, agent_bridge::native::ABI_VERSION)
    }

    pub fn without_streaming() -> Arc<Self> {
        Self::build(true, false, agent_bridge::native::ABI_VERSION)
    }

    pub fn with_abi(abi_version: u32) -> Arc<Self> {
        Self::build(true, true, abi_version)
    }

    fn build(callbacks: bool, streaming: bool, abi_version: u32) -> Arc<Self> {
        Arc::new(Self {
            callbacks,
            streaming,
            abi_version,
            next_handle: AtomicU64::new(0),
            live: Mutex::new(HashSet::new()),
            script: Mutex::new(vec![Step::finish("done")]),
            destroy_calls: AtomicUsize::new(0),
            finals: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
            runs: Mutex::new(Vec::new()),
            tool_replies: Mutex::new(Vec::new()),
            engine_resolved: Mutex::new(Vec::new()),
            generate_options: Mutex::new(Vec::new()),
        })
    }

    pub fn script(&self, steps: Vec<Step>) {
        *self.script.lock().unwrap() = steps;
    }

    pub fn live_handles(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    pub fn runs(&self) -> Vec<RunRecord> {
        self.runs.lock().unwrap().clone()
    }

    pub fn replies(&self) -> Vec<NativeResult<String>> {
        self.tool_replies.lock().unwrap().clone()
    }

    fn check_live(&self, handle: Handle) -> NativeResult<()> {
        if self.live.lock().unwrap().contains(&handle.id()) {
            Ok(())
        } else {
            Err(NativeError::new(format!("Provider {handle} not found")))
        }
    }

    fn record(&self, entry: Entry, request: &AgentRunRequest<'_>) {
        self.runs.lock().unwrap().push(RunRecord {
            entry,
            name: request.name.to_string(),
            tools: request.tools.to_vec(),
            options: request.options.clone(),
        });
    }

    /// Play the script. With a sink, emits `step_start`, `tool_result`,
    /// `text_delta` and `done` events as the script advances.
    async fn play(
        &self,
        executor: Option<ToolExecutor>,
        sink: Option<&EventSink>,
    ) -> NativeResult<AgentResult> {
        let emit = |event: Value| -> NativeResult<()> {
            match sink {
                Some(sink) => sink.emit(&event.to_string()),
                None => Ok(()),
            }
        };
        let steps = self.script.lock().unwrap().clone();
        let mut taken = 0u32;
        for step in steps {
            emit(json!({ "type": "step_start", "step": taken }))?;
            taken += 1;
            match step {
                Step::Tools(calls) => match &executor {
                    Some(executor) => {
                        let tools: Vec<String> = calls.iter().map(|(tool, _)| tool.clone()).collect();
                        let pending = calls.into_iter().map(|(tool, args)| {
                            let executor = executor.clone();
                            async move {
                                let text = ToolCallEnvelope::new(tool, args)
                                    .to_text()
                                    .map_err(|e| NativeError::new(e.to_string()))?;
                                executor.call(text).await
                            }
                        });
                        let replies = join_all(pending).await;
                        for (tool, reply) in tools.iter().zip(&replies) {
                            let (result, is_error) = match reply {
                                Ok(text) => (Value::from(text.as_str()), false),
                                Err(e) => (Value::from(e.message()), true),
                            };
                            emit(json!({
                                "type": "tool_result",
                                "step": taken - 1,
                                "toolName": tool,
                                "result": result,
                                "isError": is_error,
                            }))?;
                        }
                        self.tool_replies.lock().unwrap().extend(replies);
                    }
                    None => {
                        self.engine_resolved
                            .lock()
                            .unwrap()
                            .extend(calls.into_iter().map(|(tool, _)| tool));
                    }
                },
                Step::Final(text) => {
                    self.finals.fetch_add(1, Ordering::SeqCst);
                    let usage = Usage {
                        input_tokens: 10 * u64::from(taken),
                        output_tokens: 5 * u64::from(taken),
                    };
                    emit(json!({ "type": "text_delta", "step": taken - 1, "delta": text }))?;
                    emit(json!({
                        "type": "done",
                        "text": text,
                        "steps": taken,
                        "inputTokens": usage.input_tokens,
                        "outputTokens": usage.output_tokens,
                    }))?;
                    return Ok(AgentResult {
                        text,
                        steps: taken,
                        usage,
                        structured_output: None,
                    });
                }
            }
        }
        Err(NativeError::new("script ended without a final answer"))
    }
}

#[async_trait]
impl DirectModule for ScriptedEngine {
    fn capabilities(&self) -> ModuleCapabilities {
        ModuleCapabilities {
            abi_version: self.abi_version,
            tool_callbacks: self.callbacks,
            streaming: self.streaming,
            version: Some("scripted".into()),
        }
    }

    async fn create_provider(
        &self,
        provider_type: &str,
        model: &str,
        options: &ProviderOptions,
    ) -> NativeResult<Handle> {
        if provider_type.is_empty() {
            return Err(NativeError::new("provider type is required"));
        }
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        self.live.lock().unwrap().insert(id);
        self.created
            .lock()
            .unwrap()
            .push((provider_type.to_string(), model.to_string(), options.clone()));
        Ok(Handle(id))
    }

    async fn destroy_provider(&self, handle: Handle) -> NativeResult<()> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        if self.live.lock().unwrap().remove(&handle.id()) {
            Ok(())
        } else {
            Err(NativeError::new(format!("Provider {handle} not found")))
        }
    }

    async fn provider_capabilities(&self, handle: Handle) -> NativeResult<ProviderCapabilities> {
        self.check_live(handle)?;
        Ok(ProviderCapabilities {
            streaming: self.streaming,
            tool_use: true,
            structured_output: true,
            ..ProviderCapabilities::default()
        })
    }

    async fn generate(
        &self,
        handle: Handle,
        messages: &[Message],
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> NativeResult<GenerateResult> {
        self.check_live(handle)?;
        self.generate_options.lock().unwrap().push((temperature, max_tokens));
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        Ok(GenerateResult {
            text: format!("echo: {last}"),
            usage: Usage {
                input_tokens: messages.len() as u64,
                output_tokens: 1,
            },
            finish_reason: Some("stop".into()),
        })
    }

    async fn generate_with_tools(
        &self,
        handle: Handle,
        _messages: &[Message],
        tools: &[ToolSchema],
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> NativeResult<GenerateWithToolsResult> {
        self.check_live(handle)?;
        self.generate_options.lock().unwrap().push((temperature, max_tokens));
        Ok(GenerateWithToolsResult {
            text: String::new(),
            tool_calls: tools
                .iter()
                .take(1)
                .map(|t| ToolCall {
                    id: Some("call_1".into()),
                    name: t.name.clone(),
                    args: json!({}),
                })
                .collect(),
            usage: Usage::default(),
            finish_reason: Some("tool_calls".into()),
        })
    }

    async fn agent_run(&self, request: AgentRunRequest<'_>) -> NativeResult<AgentResult> {
        self.check_live(request.provider)?;
        self.record(Entry::AgentRun, &request);
        self.play(None, None).await
    }

    async fn agent_run_with_tool_executor(
        &self,
        request: AgentRunRequest<'_>,
        executor: ToolExecutor,
    ) -> NativeResult<AgentResult> {
        if !self.callbacks {
            return Err(NativeError::new("tool callbacks not supported"));
        }
        self.check_live(request.provider)?;
        self.record(Entry::WithToolExecutor, &request);
        self.play(Some(executor), None).await
    }

    async fn agent_stream(
        &self,
        request: AgentRunRequest<'_>,
        sink: EventSink,
        executor: Option<ToolExecutor>,
    ) -> NativeResult<AgentResult> {
        if !self.streaming {
            return Err(NativeError::new("streaming not supported"));
        }
        if executor.is_some() && !self.callbacks {
            return Err(NativeError::new("tool callbacks not supported"));
        }
        self.check_live(request.provider)?;
        self.record(Entry::Stream, &request);
        self.play(executor, Some(&sink)).await
    }
}

/// [`ScriptedEngine`] behind the envelope contract. Records every raw message.
pub struct EnvelopeEngine {
    pub engine: Arc<ScriptedEngine>,
    pub messages: Mutex<Vec<Value>>,
}

impl EnvelopeEngine {
    pub fn new(engine: Arc<ScriptedEngine>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            messages: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self, method: &str) -> Vec<Value> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m["method"] == method)
            .cloned()
            .collect()
    }

    async fn dispatch(&self, method: &str, args: &Value) -> NativeResult<Value> {
        let engine = &self.engine;
        let handle = || -> NativeResult<Handle> { field(args, "handle") };
        match method {
            "describe" => Ok(json!({ "abiVersion": engine.abi_version, "toolCallbacks": false, "version": "scripted" })),
            "createProvider" => {
                let provider_type: String = field(args, "type")?;
                let model: String = field(args, "model")?;
                let options: ProviderOptions = field(args, "options")?;
                let h = engine.create_provider(&provider_type, &model, &options).await?;
                Ok(json!(h))
            }
            "destroyProvider" => {
                engine.destroy_provider(handle()?).await?;
                Ok(Value::Null)
            }
            "getProviderCapabilities" => to_value(engine.provider_capabilities(handle()?).await?),
            "generate" => {
                let messages: Vec<Message> = field(args, "messages")?;
                let out = engine
                    .generate(handle()?, &messages, field(args, "temperature")?, field(args, "maxTokens")?)
                    .await?;
                to_value(out)
            }
            "generateWithTools" => {
                let messages: Vec<Message> = field(args, "messages")?;
                let tools: Vec<ToolSchema> = field(args, "tools")?;
                let out = engine
                    .generate_with_tools(
                        handle()?,
                        &messages,
                        &tools,
                        field(args, "temperature")?,
                        field(args, "maxTokens")?,
                    )
                    .await?;
                to_value(out)
            }
            "agentRun" => {
                let name: String = field(args, "name")?;
                let tools: Vec<ToolSchema> = field(args, "tools")?;
                let messages: Vec<Message> = field(args, "messages")?;
                let options: AgentOptions = field(args, "options")?;
                let request = AgentRunRequest {
                    name: &name,
                    provider: field(args, "providerHandle")?,
                    tools: &tools,
                    messages: &messages,
                    options: &options,
                };
                to_value(engine.agent_run(request).await?)
            }
            other => Err(NativeError::new(format!("unknown method '{other}'"))),
        }
    }
}

fn field<T: serde::de::DeserializeOwned>(args: &Value, key: &str) -> NativeResult<T> {
    let value = args.get(key).cloned().ok_or_else(|| NativeError::new(format!("missing field '{key}'")))?;
    serde_json::from_value(value).map_err(|e| NativeError::new(format!("bad field '{key}': {e}")))
}

fn to_value<T: serde::Serialize>(value: T) -> NativeResult<Value> {
    serde_json::to_value(value).map_err(|e| NativeError::new(e.to_string()))
}

#[async_trait]
impl EnvelopeModule for EnvelopeEngine {
    async fn call(&self, message: String) -> NativeResult<String> {
        let parsed: Value = serde_json::from_str(&message).map_err(|e| NativeError::new(e.to_string()))?;
        self.messages.lock().unwrap().push(parsed.clone());
        let method = parsed["method"].as_str().unwrap_or_default().to_string();
        let reply = match self.dispatch(&method, &parsed["args"]).await {
            Ok(value) => json!({ "ok": true, "value": value }),
            Err(e) => json!({ "ok": false, "error": e.message() }),
        };
        Ok(reply.to_string())
    }
}

/// A bridge whose selection is already pinned to `engine` through the Direct strategy.
pub fn direct_bridge(engine: Arc<ScriptedEngine>) -> AgentBridge {
    let selector = BackendSelector::new(Vec::new());
    selector
        .override_backend(Backend::from_direct("scripted", engine))
        .unwrap();
    AgentBridge::new(Arc::new(selector))
}

/// A bridge pinned to `engine` through the Envelope strategy.
pub fn envelope_bridge(engine: Arc<EnvelopeEngine>) -> AgentBridge {
    let selector = BackendSelector::new(Vec::new());
    selector
        .override_backend(Backend::from_envelope(
            "scripted-envelope",
            engine,
            ModuleCapabilities::current(false),
        ))
        .unwrap();
    AgentBridge::new(Arc::new(selector))
}
