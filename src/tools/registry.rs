//! Explicit tool registration and per-agent resolution.
//!
//! Tools are registered once in a [`ToolCatalog`] by the composition root.
//! Each agent then gets a [`ToolRegistry`] binding the tool specs declared in
//! its profile to catalog entries.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use super::arguments::ToolArguments;
use super::tool::Tool;
use super::types::ToolSpec;
use super::validation::validate_arguments;
use crate::provider::ToolDefinition;

/// Name of the tool an agent calls to hand the request to another agent.
pub const GET_HELP: &str = "get_help";

/// Why a model-issued tool call could not be dispatched.
///
/// Every variant is recovered inside the agent loop by rolling back the
/// round; none of them reach the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolCallFault {
    #[error("tool '{name}' is not available")]
    NotFound { name: String },
    #[error("arguments for '{name}' are not valid JSON: {error}")]
    MalformedArguments { name: String, error: String },
    #[error("arguments for '{name}' do not match its signature: {reason}")]
    ArgumentMismatch { name: String, reason: String },
    #[error("tool '{name}' failed: {message}")]
    ExecutionFailed { name: String, message: String },
}

/// All callable tools known to the process, keyed by name.
#[derive(Clone, Default)]
pub struct ToolCatalog {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; a later registration under the same name replaces it.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("tools", &self.names())
            .finish()
    }
}

/// The tools one agent may call.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Bind declared specs to catalog entries.
    ///
    /// A spec with no registered implementation is still advertised to the
    /// model; calling it resolves to [`ToolCallFault::NotFound`].
    pub fn bind(agent: &str, specs: &[ToolSpec], catalog: &ToolCatalog) -> Self {
        let mut tools = HashMap::new();
        for spec in specs {
            match catalog.get(&spec.name) {
                Some(tool) => {
                    tools.insert(spec.name.clone(), tool);
                }
                None => warn!(agent, tool = %spec.name, "declared tool has no implementation"),
            }
        }
        Self {
            specs: specs.to_vec(),
            tools,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Definitions sent to the completion service.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.specs.iter().map(ToolSpec::to_definition).collect()
    }

    /// Look up a callable by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>, ToolCallFault> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolCallFault::NotFound {
                name: name.to_string(),
            })
    }

    /// Decode raw arguments and check them against the tool's signature.
    pub fn prepare_arguments(
        &self,
        tool: &dyn Tool,
        raw: &str,
    ) -> Result<ToolArguments, ToolCallFault> {
        let args = ToolArguments::parse(raw).map_err(|e| ToolCallFault::MalformedArguments {
            name: tool.name().to_string(),
            error: e.to_string(),
        })?;
        self.validate_arguments(tool, args.raw())?;
        Ok(args)
    }

    /// Reject calls whose argument names do not fit the tool's signature.
    pub fn validate_arguments(
        &self,
        tool: &dyn Tool,
        args: &serde_json::Value,
    ) -> Result<(), ToolCallFault> {
        validate_arguments(args, &tool.parameters().schema).map_err(|reason| {
            ToolCallFault::ArgumentMismatch {
                name: tool.name().to_string(),
                reason,
            }
        })
    }

    /// Whether `name` is the handoff signal.
    pub fn is_help_request(name: &str) -> bool {
        name == GET_HELP
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut bound: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        bound.sort_unstable();
        f.debug_struct("ToolRegistry")
            .field("declared", &self.specs.iter().map(|s| s.name.as_str()).collect::<Vec<_>>())
            .field("bound", &bound)
            .finish()
    }
}
