use crate::native::Handle;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "config.envelope_command", "tools[1].name")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., per-candidate probe failures)
    pub details: Option<String>,
    /// Source of the error (e.g., "backend_selector", "envelope_marshaller")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the bridge.
///
/// Nothing here is retried or recovered by this crate: every variant is
/// forwarded to the caller as a failed operation.
#[derive(Debug, Error)]
pub enum Error {
    /// No native module could be loaded, or the bridge was misconfigured.
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    /// An operation was attempted on a handle that has already been released.
    #[error("Use after destroy: {resource} handle {handle} has already been released")]
    UseAfterDestroy {
        resource: &'static str,
        handle: Handle,
    },

    /// The engine named a tool that has no host implementation during a bridged run.
    #[error("Unresolved tool: '{0}' has no host implementation")]
    UnresolvedTool(String),

    /// The active module fundamentally cannot perform the operation.
    #[error("Capability unavailable: {capability} is not supported by backend '{backend}'")]
    CapabilityUnavailable { capability: String, backend: String },

    /// Opaque failure reported by the native engine, surfaced unchanged.
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn capability_unavailable(capability: impl Into<String>, backend: impl Into<String>) -> Self {
        Error::CapabilityUnavailable {
            capability: capability.into(),
            backend: backend.into(),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Validation { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    /// Whether this error was raised by the native engine rather than the bridge.
    pub fn is_engine_error(&self) -> bool {
        matches!(self, Error::Engine(_))
    }
}

impl From<crate::native::NativeError> for Error {
    fn from(err: crate::native::NativeError) -> Self {
        Error::Engine(err.into_message())
    }
}
