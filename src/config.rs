//! Bridge configuration.
//!
//! Settings can come from a YAML file, from the environment, or both
//! (environment wins):
//! - `AGENT_BRIDGE_BACKEND`: pin selection to one candidate by name
//! - `AGENT_BRIDGE_ENVELOPE_CMD`: command line of the envelope process module
//! - `AGENT_BRIDGE_INPROCESS`: `0`/`false` disables the in-process candidate

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, ErrorContext, Result};

pub const ENV_BACKEND: &str = "AGENT_BRIDGE_BACKEND";
pub const ENV_ENVELOPE_CMD: &str = "AGENT_BRIDGE_ENVELOPE_CMD";
pub const ENV_INPROCESS: &str = "AGENT_BRIDGE_INPROCESS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Only this candidate is probed when set.
    pub backend: Option<String>,
    pub envelope_command: Option<String>,
    pub inprocess_enabled: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            backend: None,
            envelope_command: None,
            inprocess_enabled: true,
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(backend) = non_empty(ENV_BACKEND) {
            self.backend = Some(backend);
        }
        if let Some(cmd) = non_empty(ENV_ENVELOPE_CMD) {
            self.envelope_command = Some(cmd);
        }
        if let Some(flag) = non_empty(ENV_INPROCESS) {
            self.inprocess_enabled = !matches!(flag.to_ascii_lowercase().as_str(), "0" | "false" | "off" | "no");
        }
        self
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid bridge config: {e}"),
                ErrorContext::new().with_source("bridge_config"),
            )
        })
    }

    /// Load a YAML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
            .map_err(|e| match e {
                Error::Configuration { message, context } => Error::Configuration {
                    message,
                    context: context.with_field_path(path.display().to_string()),
                },
                other => other,
            })
            .map(Self::with_env_overrides)
    }

    pub fn backend(mut self, name: impl Into<String>) -> Self {
        self.backend = Some(name.into());
        self
    }

    pub fn envelope_command(mut self, cmd: impl Into<String>) -> Self {
        self.envelope_command = Some(cmd.into());
        self
    }

    pub fn inprocess_enabled(mut self, enabled: bool) -> Self {
        self.inprocess_enabled = enabled;
        self
    }
}
