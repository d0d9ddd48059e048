//! Convenience re-exports for common use.

pub use crate::agent::{
    Agent, AgentOutcome, AgentProfile, AgentRunner, FileSessionStore, InMemorySessionStore,
    IntentClassifier, SessionStore, TurnEnd,
};
pub use crate::config::SwitchboardConfig;
pub use crate::error::SwitchboardError;
pub use crate::history::HistoryPolicy;
pub use crate::provider::{CompletionRequest, CompletionResponse, ModelProvider};
pub use crate::tools::{AgentTool, AgentToolParameters, Tool, ToolArguments, ToolCatalog};
pub use crate::types::{ContentPart, Conversation, ModelMessage, Role, ToolCall, Usage};
