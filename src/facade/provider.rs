//! Provider facade: one engine-side provider behind an opaque handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::marshal::Marshaller;
use crate::native::Handle;
use crate::types::{
    GenerateOptions, GenerateResult, GenerateWithToolsResult, Message, ProviderCapabilities,
    ToolDefinition,
};
use crate::{Error, Result};

/// Owns one provider handle until [`destroy`](ProviderFacade::destroy).
///
/// Shared between agents as `Arc<ProviderFacade>`. Dropping an undestroyed
/// facade does not release the engine resource; it only logs a warning.
pub struct ProviderFacade {
    backend: Arc<Backend>,
    handle: Handle,
    provider_type: String,
    model: String,
    destroyed: AtomicBool,
}

impl ProviderFacade {
    pub(crate) fn new(
        backend: Arc<Backend>,
        handle: Handle,
        provider_type: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            handle,
            provider_type: provider_type.into(),
            model: model.into(),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn provider_type(&self) -> &str {
        &self.provider_type
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// The handle, unless it has been released.
    pub fn live_handle(&self) -> Result<Handle> {
        if self.is_destroyed() {
            return Err(Error::UseAfterDestroy {
                resource: "provider",
                handle: self.handle,
            });
        }
        Ok(self.handle)
    }

    pub(crate) fn marshaller(&self) -> &Arc<dyn Marshaller> {
        self.backend.marshaller()
    }

    /// Features the engine reports for this provider.
    pub async fn capabilities(&self) -> Result<ProviderCapabilities> {
        let handle = self.live_handle()?;
        self.marshaller().provider_capabilities(handle).await
    }

    pub async fn generate(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<GenerateResult> {
        let handle = self.live_handle()?;
        self.marshaller().generate(handle, messages, options).await
    }

    /// Single generation that offers `tools` to the model.
    ///
    /// The engine only sees tool schemas; host implementations are ignored.
    pub async fn generate_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &GenerateOptions,
    ) -> Result<GenerateWithToolsResult> {
        let handle = self.live_handle()?;
        let schemas: Vec<_> = tools.iter().map(ToolDefinition::schema).collect();
        self.marshaller()
            .generate_with_tools(handle, messages, &schemas, options)
            .await
    }

    /// Release the handle. Only the first call reaches the engine; later
    /// calls return `Ok(())`.
    ///
    /// If the engine fails the first release, the error is returned and the
    /// facade still counts as destroyed.
    pub async fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            debug!(handle = %self.handle, "provider already destroyed");
            return Ok(());
        }
        self.marshaller().destroy_provider(self.handle).await?;
        debug!(handle = %self.handle, backend = %self.backend.name(), "provider destroyed");
        Ok(())
    }
}

impl std::fmt::Debug for ProviderFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderFacade")
            .field("handle", &self.handle)
            .field("provider_type", &self.provider_type)
            .field("model", &self.model)
            .field("backend", &self.backend.name())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl Drop for ProviderFacade {
    fn drop(&mut self) {
        if !*self.destroyed.get_mut() {
            warn!(
                handle = %self.handle,
                provider = %self.provider_type,
                model = %self.model,
                "provider dropped without destroy(); engine handle leaked"
            );
        }
    }
}
