//! # agent-bridge
//!
//! Host-side adapter for a native agent-execution engine.
//!
//! The engine ships as two interchangeable modules: an in-process one that
//! hands out opaque handles and can call back into the host mid-run, and a
//! sandboxed one that accepts exactly one serialized message per call. This
//! crate gives both a single interface.
//!
//! ## Overview
//!
//! - **Backend selection**: candidates are probed once in priority order and
//!   the first compatible module is memoized ([`backend::BackendSelector`]).
//! - **Marshalling**: each calling convention has its own
//!   [`marshal::Marshaller`], including how absent options are encoded.
//! - **Handle lifecycle**: [`ProviderFacade`] owns one engine handle with an
//!   idempotent `destroy()`.
//! - **Tool bridging**: agents whose tools carry host implementations run with
//!   a [`bridge::ToolCallBridge`] answering engine tool calls by correlation id.
//! - **Streaming**: [`AgentFacade::stream`] forwards engine progress events
//!   through a [`bridge::event_channel`] on backends that support it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agent_bridge::{AgentBridge, BridgeConfig, ProviderOptions, ToolDefinition};
//!
//! #[tokio::main]
//! async fn main() -> agent_bridge::Result<()> {
//!     let config = BridgeConfig::from_env().envelope_command("agent-engine --stdio");
//!     let bridge = AgentBridge::from_config(&config, None);
//!
//!     let provider = bridge
//!         .create_provider("openai", "gpt-4o", ProviderOptions::new("sk-..."))
//!         .await?;
//!     let agent = bridge
//!         .agent("assistant", provider.clone())
//!         .instructions("Answer briefly.")
//!         .tool(ToolDefinition::new("echo", "Echo the arguments").execute_fn(|args| async move { Ok(args) }))
//!         .build()?;
//!
//!     let result = agent.run_prompt("What is 6 * 7?").await?;
//!     println!("{} ({} steps)", result.text, result.steps);
//!
//!     provider.destroy().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`native`] | Engine contract: handles, module traits, capability record |
//! | [`marshal`] | Direct and Envelope marshalling strategies |
//! | [`backend`] | Candidate probing and memoized backend selection |
//! | [`bridge`] | Tool table and the engine-to-host tool-call channel |
//! | [`facade`] | `AgentBridge`, `ProviderFacade`, `AgentFacade` |
//! | [`config`] | `BridgeConfig` from YAML and environment |
//! | [`types`] | Messages, tools, options, results |

pub mod backend;
pub mod bridge;
pub mod config;
pub mod facade;
pub mod marshal;
pub mod native;
pub mod types;

pub use backend::{Backend, BackendSelector, ModuleCandidate};
pub use config::BridgeConfig;
pub use facade::{AgentBridge, AgentBuilder, AgentFacade, ProviderFacade};
pub use native::Handle;
pub use types::{
    AgentOptions, AgentResult, GenerateOptions, GenerateResult, GenerateWithToolsResult, Message,
    MessageRole, ProviderCapabilities, ProviderOptions, ToolDefinition, ToolError,
};
pub use bridge::{EventStream, StreamEvent};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
