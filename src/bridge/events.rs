//! Event channel for streamed agent runs.
//!
//! The engine pushes one serialized event per progress notification into an
//! [`EventSink`]; the host drains the paired [`EventStream`]. Events carry a
//! `type` tag (`step_start`, `text_delta`, `tool_result`, `done`, ...) and
//! whatever fields the engine attaches to it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::native::{NativeError, NativeResult};

/// One progress notification of a streamed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl StreamEvent {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn parse(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_text(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Engine-facing end of the event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    events: mpsc::UnboundedSender<StreamEvent>,
}

impl EventSink {
    /// Push one serialized event.
    ///
    /// A malformed event is reported back to the engine. Events emitted after
    /// the host stopped listening are discarded.
    pub fn emit(&self, event_json: &str) -> NativeResult<()> {
        let event = StreamEvent::parse(event_json)
            .map_err(|e| NativeError::new(format!("malformed stream event: {e}")))?;
        let _ = self.events.send(event);
        Ok(())
    }

    /// Whether the host side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// Host-facing end of the event channel. Ends once every sink clone is gone.
#[derive(Debug)]
pub struct EventStream {
    events: mpsc::UnboundedReceiver<StreamEvent>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }
}

impl futures::Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamEvent>> {
        self.events.poll_recv(cx)
    }
}

/// Create a connected sink/stream pair.
pub fn event_channel() -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { events: tx }, EventStream { events: rx })
}
