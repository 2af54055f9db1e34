//! Correlation-id request/response channel between the engine and the host.
//!
//! The engine side ([`ToolExecutor`]) tags every request with a fresh id and
//! parks a reply slot under that id. The host side ([`BridgeEndpoint`])
//! receives tagged requests and answers by id, in whatever order the host
//! work completes. No call-stack re-entrancy is assumed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};

use crate::native::{NativeError, NativeResult};

/// Correlation id of one tool call.
pub type CallId = u64;

/// A tagged tool call issued by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequest {
    pub id: CallId,
    /// Serialized `ToolCallEnvelope`.
    pub envelope: String,
}

#[derive(Default)]
struct PendingCalls {
    next_id: AtomicU64,
    slots: Mutex<HashMap<CallId, oneshot::Sender<NativeResult<String>>>>,
}

impl PendingCalls {
    fn register(&self) -> (CallId, oneshot::Receiver<NativeResult<String>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        (id, rx)
    }

    fn take(&self, id: CallId) -> Option<oneshot::Sender<NativeResult<String>>> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Engine-facing end of the bridge, handed to
/// [`DirectModule::agent_run_with_tool_executor`](crate::native::DirectModule::agent_run_with_tool_executor).
///
/// Cheap to clone; clones may be used concurrently for parallel tool calls.
#[derive(Clone)]
pub struct ToolExecutor {
    requests: mpsc::UnboundedSender<ToolRequest>,
    pending: Arc<PendingCalls>,
}

impl ToolExecutor {
    /// Issue one tool call and wait for the host's answer.
    ///
    /// `call_envelope` is the serialized `ToolCallEnvelope`; the answer is the
    /// serialized tool result, or the failure reported by the host.
    pub async fn call(&self, call_envelope: String) -> NativeResult<String> {
        let (id, reply) = self.pending.register();
        let request = ToolRequest {
            id,
            envelope: call_envelope,
        };
        if self.requests.send(request).is_err() {
            self.pending.take(id);
            return Err(NativeError::new("tool bridge is closed"));
        }
        reply
            .await
            .map_err(|_| NativeError::new(format!("tool bridge dropped call {id}")))?
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Host-facing end of the bridge.
pub struct BridgeEndpoint {
    requests: mpsc::UnboundedReceiver<ToolRequest>,
    pending: Arc<PendingCalls>,
}

impl BridgeEndpoint {
    /// Next tagged request, or `None` once every executor clone is gone.
    pub async fn next_request(&mut self) -> Option<ToolRequest> {
        self.requests.recv().await
    }

    /// Answer the request tagged `id`. Returns `false` if nobody waits for it anymore.
    pub fn respond(&self, id: CallId, reply: NativeResult<String>) -> bool {
        match self.pending.take(id) {
            Some(slot) => slot.send(reply).is_ok(),
            None => false,
        }
    }

    /// Number of calls issued but not yet answered.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }
}

/// Create a connected executor/endpoint pair.
pub fn channel() -> (ToolExecutor, BridgeEndpoint) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(PendingCalls::default());
    (
        ToolExecutor {
            requests: tx,
            pending: pending.clone(),
        },
        BridgeEndpoint {
            requests: rx,
            pending,
        },
    )
}
