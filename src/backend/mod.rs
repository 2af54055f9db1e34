//! Backend selection.
//!
//! A [`BackendSelector`] owns a ranked list of [`ModuleCandidate`]s. The
//! first selection probes them in priority order and memoizes the first one
//! that loads and reports a compatible capability record; every later call
//! reuses that [`Backend`] without probing again.
//!
//! The selector is injected, not global: tests build their own or call
//! [`BackendSelector::override_backend`] before first use.

pub mod candidates;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::marshal::{envelope, DirectMarshaller, EnvelopeMarshaller, Marshaller, Strategy};
use crate::native::{DirectModule, EnvelopeModule, ModuleCapabilities, ABI_VERSION};
use crate::{Error, ErrorContext, Result};

pub use candidates::{default_candidates, DirectFactory, InProcessCandidate, ProcessCandidate};

/// A native module as loaded by a candidate, before it is wrapped.
#[derive(Clone)]
pub enum LoadedModule {
    Direct(Arc<dyn DirectModule>),
    Envelope(Arc<dyn EnvelopeModule>),
}

impl LoadedModule {
    pub fn strategy(&self) -> Strategy {
        match self {
            LoadedModule::Direct(_) => Strategy::Direct,
            LoadedModule::Envelope(_) => Strategy::Envelope,
        }
    }
}

/// One way of obtaining a native module.
#[async_trait]
pub trait ModuleCandidate: Send + Sync {
    fn name(&self) -> &str;

    /// Lower is tried first.
    fn priority(&self) -> u32;

    /// Load the module. Failing here means "not available in this environment".
    async fn load(&self) -> Result<LoadedModule>;
}

/// The active native module behind its marshaller.
#[derive(Clone)]
pub struct Backend {
    name: String,
    capabilities: ModuleCapabilities,
    marshaller: Arc<dyn Marshaller>,
}

impl Backend {
    pub fn from_direct(name: impl Into<String>, module: Arc<dyn DirectModule>) -> Self {
        let marshaller = DirectMarshaller::new(name, module);
        let capabilities = marshaller.capabilities().clone();
        Self::from_marshaller(Arc::new(marshaller), capabilities)
    }

    pub fn from_envelope(
        name: impl Into<String>,
        module: Arc<dyn EnvelopeModule>,
        capabilities: ModuleCapabilities,
    ) -> Self {
        Self::from_marshaller(Arc::new(EnvelopeMarshaller::new(name, module)), capabilities)
    }

    /// Wrap an arbitrary marshaller, e.g. a test double.
    pub fn from_marshaller(marshaller: Arc<dyn Marshaller>, capabilities: ModuleCapabilities) -> Self {
        Self {
            name: marshaller.backend_name().to_string(),
            capabilities,
            marshaller,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> Strategy {
        self.marshaller.strategy()
    }

    pub fn capabilities(&self) -> &ModuleCapabilities {
        &self.capabilities
    }

    pub fn marshaller(&self) -> &Arc<dyn Marshaller> {
        &self.marshaller
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name)
            .field("strategy", &self.strategy())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Outcome of probing one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub name: String,
    pub priority: u32,
    pub strategy: Option<Strategy>,
    pub outcome: std::result::Result<ModuleCapabilities, String>,
}

impl ProbeReport {
    pub fn is_available(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Chooses and memoizes the active native module.
pub struct BackendSelector {
    candidates: Vec<Arc<dyn ModuleCandidate>>,
    pinned: Option<String>,
    selected: ArcSwapOption<Backend>,
    selecting: Mutex<()>,
}

impl BackendSelector {
    /// Candidates are ordered by ascending priority; ties keep registration order.
    pub fn new(mut candidates: Vec<Arc<dyn ModuleCandidate>>) -> Self {
        candidates.sort_by_key(|c| c.priority());
        Self {
            candidates,
            pinned: None,
            selected: ArcSwapOption::from(None),
            selecting: Mutex::new(()),
        }
    }

    /// Restrict selection to the candidate named `name`.
    pub fn pin(mut self, name: impl Into<String>) -> Self {
        self.pinned = Some(name.into());
        self
    }

    pub fn candidate_names(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.name()).collect()
    }

    /// The memoized backend, if selection already happened.
    pub fn current(&self) -> Option<Arc<Backend>> {
        self.selected.load_full()
    }

    /// Resolve the active backend, probing candidates on first use only.
    pub async fn select(&self) -> Result<Arc<Backend>> {
        if let Some(backend) = self.selected.load_full() {
            return Ok(backend);
        }

        let _guard = self.selecting.lock().await;
        // Another caller may have finished while we waited.
        if let Some(backend) = self.selected.load_full() {
            return Ok(backend);
        }

        let backend = Arc::new(self.detect().await?);
        info!(
            backend = %backend.name(),
            strategy = %backend.strategy(),
            tool_callbacks = backend.capabilities().tool_callbacks,
            "selected native backend"
        );
        self.selected.store(Some(backend.clone()));
        Ok(backend)
    }

    /// Install `backend` as the selection. Only valid before auto-detection.
    pub fn override_backend(&self, backend: Backend) -> Result<()> {
        let _guard = self.selecting.try_lock().map_err(|_| {
            Error::configuration("cannot override backend while selection is in progress")
        })?;
        if let Some(current) = self.selected.load_full() {
            return Err(Error::configuration_with_context(
                format!("backend '{}' is already selected", current.name()),
                ErrorContext::new().with_source("backend_selector"),
            ));
        }
        debug!(backend = %backend.name(), "backend overridden");
        self.selected.store(Some(Arc::new(backend)));
        Ok(())
    }

    /// Forget the memoized selection.
    ///
    /// Fails while a selection is in progress, since that selection would
    /// store its result right after the reset.
    pub fn reset(&self) -> Result<()> {
        let _guard = self.selecting.try_lock().map_err(|_| {
            Error::configuration_with_context(
                "cannot reset while selection is in progress",
                ErrorContext::new().with_source("backend_selector"),
            )
        })?;
        self.selected.store(None);
        Ok(())
    }

    /// Probe every candidate and report, without memoizing anything.
    pub async fn probe_all(&self) -> Vec<ProbeReport> {
        let mut reports = Vec::with_capacity(self.candidates.len());
        for candidate in &self.candidates {
            let (strategy, outcome) = match probe(candidate.as_ref()).await {
                Ok(backend) => (Some(backend.strategy()), Ok(backend.capabilities().clone())),
                Err(e) => (None, Err(e.to_string())),
            };
            reports.push(ProbeReport {
                name: candidate.name().to_string(),
                priority: candidate.priority(),
                strategy,
                outcome,
            });
        }
        reports
    }

    async fn detect(&self) -> Result<Backend> {
        let eligible: Vec<&Arc<dyn ModuleCandidate>> = match &self.pinned {
            Some(pin) => self.candidates.iter().filter(|c| c.name() == pin).collect(),
            None => self.candidates.iter().collect(),
        };
        if eligible.is_empty() {
            let message = match &self.pinned {
                Some(pin) => format!(
                    "unknown backend '{pin}' (known: {})",
                    self.candidate_names().join(", ")
                ),
                None => "no native module candidates registered".to_string(),
            };
            return Err(Error::configuration_with_context(
                message,
                ErrorContext::new()
                    .with_field_path("backend")
                    .with_source("backend_selector"),
            ));
        }

        let mut failures = Vec::new();
        for candidate in eligible {
            debug!(candidate = %candidate.name(), priority = candidate.priority(), "probing native module");
            match probe(candidate.as_ref()).await {
                Ok(backend) => return Ok(backend),
                Err(e) => {
                    warn!(candidate = %candidate.name(), error = %e, "native module unavailable");
                    failures.push(format!("{}: {}", candidate.name(), e));
                }
            }
        }

        Err(Error::configuration_with_context(
            format!("no native module could be loaded (tried {})", failures.len()),
            ErrorContext::new()
                .with_details(failures.join("; "))
                .with_source("backend_selector"),
        ))
    }
}

impl std::fmt::Debug for BackendSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSelector")
            .field("candidates", &self.candidate_names())
            .field("pinned", &self.pinned)
            .field("selected", &self.current().map(|b| b.name().to_string()))
            .finish()
    }
}

/// Load one candidate and check the capability record it reports.
async fn probe(candidate: &dyn ModuleCandidate) -> Result<Backend> {
    let backend = match candidate.load().await? {
        LoadedModule::Direct(module) => Backend::from_direct(candidate.name(), module),
        LoadedModule::Envelope(module) => {
            let capabilities = envelope::describe(module.as_ref()).await?;
            Backend::from_envelope(candidate.name(), module, capabilities)
        }
    };
    let caps = backend.capabilities();
    if !caps.is_compatible() {
        return Err(Error::configuration(format!(
            "incompatible ABI version {} (expected {ABI_VERSION})",
            caps.abi_version
        )));
    }
    Ok(backend)
}
