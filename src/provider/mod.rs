//! Completion service contract and HTTP implementations.

pub mod http;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "azure")]
pub mod azure;

use async_trait::async_trait;

use crate::config::{ProviderKind, ProviderSettings};
use crate::error::SwitchboardError;
use crate::types::{FinishReason, GenerationSettings, ModelMessage, ToolCall, Usage};

/// A chat-completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Deployment or model identifier.
    pub model: String,
    pub messages: Vec<ModelMessage>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub settings: GenerationSettings,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Log-probability of one generated token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenLogprob {
    pub token: String,
    pub logprob: f64,
}

/// Response from the completion service.
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    /// `None` when the model answered with tool calls only.
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    /// Present when the request asked for log-probabilities.
    pub logprobs: Option<Vec<TokenLogprob>>,
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
}

impl CompletionResponse {
    /// A plain text answer.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            finish_reason: Some(FinishReason::Stop),
            ..Default::default()
        }
    }

    /// A response requesting tool calls.
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            finish_reason: Some(FinishReason::ToolCalls),
            ..Default::default()
        }
    }

    pub fn with_logprobs(mut self, logprobs: Vec<TokenLogprob>) -> Self {
        self.logprobs = Some(logprobs);
        self
    }

    pub fn content_or_empty(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// The completion service consumed by agents and the intent classifier.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai", "azure").
    fn provider_name(&self) -> &str;

    /// Issue one blocking chat-completion call.
    async fn complete(&self, request: &CompletionRequest)
        -> Result<CompletionResponse, SwitchboardError>;
}

/// Create the configured provider.
#[allow(unused_variables)]
pub fn create_provider(
    settings: &ProviderSettings,
) -> Result<Box<dyn ModelProvider>, SwitchboardError> {
    let api_key = settings
        .api_key
        .clone()
        .ok_or_else(|| SwitchboardError::Authentication("Missing API key".into()))?;
    match settings.kind {
        #[cfg(feature = "openai")]
        ProviderKind::OpenAi => Ok(Box::new(openai::OpenAiProvider::new(
            api_key,
            settings.endpoint.clone(),
        ))),
        #[cfg(feature = "azure")]
        ProviderKind::Azure => {
            let endpoint = settings.endpoint.clone().ok_or_else(|| {
                SwitchboardError::Configuration("Missing AZURE_OPENAI_ENDPOINT".into())
            })?;
            Ok(Box::new(azure::AzureOpenAiProvider::new(
                endpoint,
                api_key,
                settings.api_version.clone(),
            )))
        }
        #[allow(unreachable_patterns)]
        _ => Err(SwitchboardError::Configuration(format!(
            "Provider '{}' not enabled via feature flags",
            settings.kind
        ))),
    }
}
