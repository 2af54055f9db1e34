//! Tool-call bridge: services tool calls the engine issues mid-run.
//!
//! Only the Direct strategy can reach this module. The engine calls a
//! [`ToolExecutor`]; [`ToolCallBridge::serve`] drives the engine future and,
//! concurrently, every host tool execution it requested, answering each call
//! on its own correlation id.

pub mod channel;
pub mod events;
pub mod table;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::native::NativeError;
use crate::types::ToolHandler;
use crate::{Error, Result};

pub use channel::{BridgeEndpoint, CallId, ToolExecutor, ToolRequest};
pub use events::{event_channel, EventSink, EventStream, StreamEvent};
pub use table::{RunMode, ToolTable};

/// Tool call as serialized by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallEnvelope {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCallEnvelope {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }

    pub fn parse(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_text(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

enum Resolution {
    Execute {
        tool: String,
        handler: Arc<dyn ToolHandler>,
        args: Value,
    },
    Reject(String),
}

/// Resolves engine tool calls against an agent's fixed tool table.
#[derive(Debug, Clone)]
pub struct ToolCallBridge {
    tools: Arc<ToolTable>,
}

impl ToolCallBridge {
    pub fn new(tools: Arc<ToolTable>) -> Self {
        Self { tools }
    }

    /// Fresh executor/endpoint pair for one run.
    pub fn channel(&self) -> (ToolExecutor, BridgeEndpoint) {
        channel::channel()
    }

    fn resolve(&self, request: &ToolRequest) -> Result<Resolution> {
        let call = match ToolCallEnvelope::parse(&request.envelope) {
            Ok(call) => call,
            Err(e) => return Ok(Resolution::Reject(format!("malformed tool call envelope: {e}"))),
        };
        let handler = self
            .tools
            .get(&call.tool)
            .and_then(|tool| tool.execute.clone())
            .ok_or_else(|| Error::UnresolvedTool(call.tool.clone()))?;
        Ok(Resolution::Execute {
            tool: call.tool,
            handler,
            args: call.args,
        })
    }

    /// Drive `engine` to completion while servicing its tool calls.
    ///
    /// Returns the engine's outcome. A call naming a tool without a host
    /// implementation ends the run with [`Error::UnresolvedTool`] and drops
    /// the engine future, so no further steps execute.
    pub async fn serve<T, F>(&self, engine: F, mut endpoint: BridgeEndpoint) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::pin!(engine);
        let mut in_flight = FuturesUnordered::new();
        let mut accepting = true;

        loop {
            tokio::select! {
                biased;

                outcome = &mut engine => return outcome,

                request = endpoint.next_request(), if accepting => {
                    let Some(request) = request else {
                        accepting = false;
                        continue;
                    };
                    match self.resolve(&request)? {
                        Resolution::Execute { tool, handler, args } => {
                            debug!(tool = %tool, call_id = request.id, "dispatching host tool");
                            let id = request.id;
                            in_flight.push(async move {
                                let reply = match handler.execute(args).await {
                                    Ok(value) => serde_json::to_string(&value).map_err(|e| {
                                        NativeError::new(format!("tool '{tool}' returned an unserializable result: {e}"))
                                    }),
                                    Err(e) => Err(NativeError::new(format!("tool '{tool}' failed: {e}"))),
                                };
                                (id, reply)
                            });
                        }
                        Resolution::Reject(reason) => {
                            debug!(call_id = request.id, %reason, "rejecting tool call");
                            endpoint.respond(request.id, Err(NativeError::new(reason)));
                        }
                    }
                }

                Some((id, reply)) = in_flight.next(), if !in_flight.is_empty() => {
                    if !endpoint.respond(id, reply) {
                        debug!(call_id = id, "tool result had no waiting caller");
                    }
                }
            }
        }
    }
}
