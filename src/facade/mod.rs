//! Host-facing facades.
//!
//! [`AgentBridge`] is the entry point: it resolves the active backend through
//! an injected [`BackendSelector`] and hands out [`ProviderFacade`]s and
//! [`AgentFacade`]s bound to it. Facades never see which strategy is active.

pub mod agent;
pub mod prelude;
pub mod provider;

use std::sync::Arc;
use tracing::debug;

use crate::backend::{default_candidates, BackendSelector, DirectFactory};
use crate::config::BridgeConfig;
use crate::types::{AgentOptions, ProviderOptions, ToolDefinition};
use crate::Result;

pub use agent::{AgentBuilder, AgentFacade};
pub use provider::ProviderFacade;

/// Entry point for creating providers and agents.
#[derive(Debug, Clone)]
pub struct AgentBridge {
    selector: Arc<BackendSelector>,
}

impl AgentBridge {
    pub fn new(selector: Arc<BackendSelector>) -> Self {
        Self { selector }
    }

    /// Build a bridge over the default candidates described by `config`.
    ///
    /// `direct_factory` supplies the in-process module when the host links one.
    pub fn from_config(config: &BridgeConfig, direct_factory: Option<DirectFactory>) -> Self {
        let mut selector = BackendSelector::new(default_candidates(config, direct_factory));
        if let Some(pin) = &config.backend {
            selector = selector.pin(pin.clone());
        }
        Self::new(Arc::new(selector))
    }

    pub fn selector(&self) -> &Arc<BackendSelector> {
        &self.selector
    }

    pub async fn create_provider(
        &self,
        provider_type: &str,
        model: &str,
        options: ProviderOptions,
    ) -> Result<Arc<ProviderFacade>> {
        let backend = self.selector.select().await?;
        let handle = backend
            .marshaller()
            .create_provider(provider_type, model, &options)
            .await?;
        debug!(%handle, provider = provider_type, model, backend = %backend.name(), "provider created");
        Ok(Arc::new(ProviderFacade::new(backend, handle, provider_type, model)))
    }

    pub fn create_agent(
        &self,
        name: impl Into<String>,
        provider: Arc<ProviderFacade>,
        options: AgentOptions,
        tools: Vec<ToolDefinition>,
    ) -> Result<AgentFacade> {
        AgentFacade::new(name, provider, options, tools)
    }

    pub fn agent(&self, name: impl Into<String>, provider: Arc<ProviderFacade>) -> AgentBuilder {
        AgentBuilder::new(name, provider)
    }
}
