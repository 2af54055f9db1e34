//! Tool definitions and host-side tool implementations.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;

/// Failure reported by a host tool implementation.
///
/// Only the message crosses the boundary; the engine decides what to do with it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ToolError {
    message: String,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ToolError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ToolError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("invalid tool arguments: {err}"))
    }
}

/// Host implementation of a tool, executed when the engine calls back mid-run.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

struct FnHandler<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F, Fut>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        (self.f)(args).await
    }
}

/// Engine-facing description of a tool. Never carries a host implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// A tool as the host declares it: schema plus an optional host implementation.
///
/// A definition without `execute` can only be resolved by the engine itself.
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Option<Value>,
    pub execute: Option<Arc<dyn ToolHandler>>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
            execute: None,
        }
    }

    /// Set the JSON schema of the tool arguments.
    pub fn parameters(mut self, schema: Value) -> Self {
        self.parameters = Some(schema);
        self
    }

    /// Derive the argument schema from a Rust type.
    pub fn try_parameters_for<T: JsonSchema>(mut self) -> Result<Self, serde_json::Error> {
        self.parameters = Some(serde_json::to_value(schemars::schema_for!(T))?);
        Ok(self)
    }

    /// Like [`try_parameters_for`](Self::try_parameters_for), but keeps the
    /// current parameters and logs a warning if the schema cannot be encoded.
    pub fn parameters_for<T: JsonSchema>(self) -> Self {
        let fallback = self.clone();
        match self.try_parameters_for::<T>() {
            Ok(tool) => tool,
            Err(e) => {
                warn!(tool = %fallback.name, error = %e, "could not encode derived parameter schema");
                fallback
            }
        }
    }

    /// Attach a host implementation.
    pub fn handler(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.execute = Some(handler);
        self
    }

    /// Attach a host implementation from an async closure over raw JSON arguments.
    pub fn execute_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        self.handler(Arc::new(FnHandler {
            f,
            _marker: PhantomData,
        }))
    }

    /// Attach a host implementation taking deserialized arguments.
    ///
    /// Arguments that do not deserialize into `A` fail the call without
    /// invoking `f`.
    pub fn execute_typed<A, R, F, Fut>(self, f: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
    {
        self.execute_fn(move |args: Value| {
            let call = serde_json::from_value::<A>(args).map(&f);
            async move {
                let output = call?.await?;
                Ok::<Value, ToolError>(serde_json::to_value(output)?)
            }
        })
    }

    pub fn has_host_impl(&self) -> bool {
        self.execute.is_some()
    }

    pub fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .field("execute", &self.execute.as_ref().map(|_| "<host fn>"))
            .finish()
    }
}
