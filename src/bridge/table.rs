//! Fixed tool table of an agent.

use std::collections::HashMap;

use crate::types::{ToolDefinition, ToolSchema};
use crate::{Error, ErrorContext, Result};

/// How tool calls are resolved for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunMode {
    /// Mode A: no tool has a host implementation, the engine resolves every call.
    EngineResolved,
    /// Mode B: at least one tool has a host implementation, calls come back to the host.
    HostBridged,
}

/// Tools keyed by unique name, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ToolTable {
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
}

impl ToolTable {
    pub fn new(tools: Vec<ToolDefinition>) -> Result<Self> {
        let mut index = HashMap::with_capacity(tools.len());
        for (i, tool) in tools.iter().enumerate() {
            if tool.name.trim().is_empty() {
                return Err(Error::validation_with_context(
                    "tool name must not be empty",
                    ErrorContext::new().with_field_path(format!("tools[{i}].name")),
                ));
            }
            if index.insert(tool.name.clone(), i).is_some() {
                return Err(Error::validation_with_context(
                    format!("duplicate tool name '{}'", tool.name),
                    ErrorContext::new().with_field_path(format!("tools[{i}].name")),
                ));
            }
        }
        Ok(Self { tools, index })
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(ToolDefinition::schema).collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Mode is decided for the whole table: one host implementation is enough for Mode B.
    pub fn mode(&self) -> RunMode {
        if self.tools.iter().any(ToolDefinition::has_host_impl) {
            RunMode::HostBridged
        } else {
            RunMode::EngineResolved
        }
    }
}
