//! Built-in module candidates.

use async_trait::async_trait;
use std::sync::Arc;

use super::{LoadedModule, ModuleCandidate};
use crate::config::BridgeConfig;
use crate::native::{DirectModule, ProcessEnvelopeModule};
use crate::{Error, ErrorContext, Result};

pub const INPROCESS: &str = "inprocess";
pub const ENVELOPE_PROCESS: &str = "envelope-process";

/// Produces the in-process engine module, if the host links one.
pub type DirectFactory = Arc<dyn Fn() -> Result<Arc<dyn DirectModule>> + Send + Sync>;

/// The in-process (Direct) module.
pub struct InProcessCandidate {
    factory: Option<DirectFactory>,
    enabled: bool,
}

impl InProcessCandidate {
    pub fn new(factory: DirectFactory) -> Self {
        Self {
            factory: Some(factory),
            enabled: true,
        }
    }

    /// A host without an in-process module. Always reports unavailable.
    pub fn unlinked() -> Self {
        Self {
            factory: None,
            enabled: true,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl ModuleCandidate for InProcessCandidate {
    fn name(&self) -> &str {
        INPROCESS
    }

    fn priority(&self) -> u32 {
        0
    }

    async fn load(&self) -> Result<LoadedModule> {
        if !self.enabled {
            return Err(Error::configuration_with_context(
                "disabled by configuration",
                ErrorContext::new().with_field_path("inprocess_enabled"),
            ));
        }
        let factory = self
            .factory
            .as_ref()
            .ok_or_else(|| Error::configuration("in-process module is not linked into this host"))?;
        Ok(LoadedModule::Direct(factory()?))
    }
}

/// The envelope module running as a child process.
pub struct ProcessCandidate {
    command: Option<String>,
}

impl ProcessCandidate {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl ModuleCandidate for ProcessCandidate {
    fn name(&self) -> &str {
        ENVELOPE_PROCESS
    }

    fn priority(&self) -> u32 {
        10
    }

    async fn load(&self) -> Result<LoadedModule> {
        let module = self
            .command
            .as_deref()
            .and_then(ProcessEnvelopeModule::from_command_line)
            .ok_or_else(|| {
                Error::configuration_with_context(
                    "no envelope command configured",
                    ErrorContext::new().with_field_path("envelope_command"),
                )
            })?;
        Ok(LoadedModule::Envelope(Arc::new(module)))
    }
}

/// Candidates derived from `config`: in-process first, then the envelope process.
pub fn default_candidates(
    config: &BridgeConfig,
    direct_factory: Option<DirectFactory>,
) -> Vec<Arc<dyn ModuleCandidate>> {
    let inprocess = match direct_factory {
        Some(factory) => InProcessCandidate::new(factory),
        None => InProcessCandidate::unlinked(),
    }
    .enabled(config.inprocess_enabled);

    vec![
        Arc::new(inprocess),
        Arc::new(ProcessCandidate::new(config.envelope_command.clone())),
    ]
}
